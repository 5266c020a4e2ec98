//! Backend fallback: a finite plan of steps walked by a small driver loop.
//!
//! Each step names a backend and where to go when it fails: another step
//! further down the plan, or nowhere. Jumps only move forward, so a plan
//! always terminates and its exhaustion order is fixed at build time.

use crate::backend::Backend;
use folio_core::error::{GenerationError, ProviderError};
use folio_core::message::ChatTurn;
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{info, warn};

/// Where the driver goes after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Continue at the step with this index.
    Next(usize),
    /// Stop and surface this step's error.
    Terminal,
}

/// One backend attempt in a plan.
pub struct PlanStep {
    backend: Arc<dyn Backend>,
    on_failure: OnFailure,
    timeout: Duration,
}

impl PlanStep {
    pub fn new(backend: Arc<dyn Backend>, on_failure: OnFailure) -> Self {
        Self {
            backend,
            on_failure,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}

/// Coarse category of a failed attempt, used for logging the hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Quota exhausted, billing problem, or bad credentials.
    QuotaOrAuth,
    Other,
}

static QUOTA_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)quota|billing|insufficient").ok());
static AUTH_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)api key|unauthorized|401").ok());

impl FailureKind {
    pub fn classify(error: &ProviderError) -> Self {
        if matches!(error, ProviderError::AuthenticationFailed(_)) {
            return FailureKind::QuotaOrAuth;
        }
        let text = error.to_string();
        let hit = |pattern: &LazyLock<Option<Regex>>| {
            pattern.as_ref().is_some_and(|re| re.is_match(&text))
        };
        if hit(&QUOTA_PATTERN) || hit(&AUTH_PATTERN) {
            FailureKind::QuotaOrAuth
        } else {
            FailureKind::Other
        }
    }
}

/// Error raised when a plan's jumps are not strictly forward and in range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid fallback plan: step {step} jumps to {target}")]
pub struct PlanError {
    pub step: usize,
    pub target: usize,
}

/// An ordered list of plan steps. Evaluation always starts at step 0.
pub struct FallbackPlan {
    steps: Vec<PlanStep>,
}

impl FallbackPlan {
    pub fn new(steps: Vec<PlanStep>) -> std::result::Result<Self, PlanError> {
        for (i, step) in steps.iter().enumerate() {
            if let OnFailure::Next(target) = step.on_failure {
                if target <= i || target >= steps.len() {
                    return Err(PlanError { step: i, target });
                }
            }
        }
        Ok(Self { steps })
    }

    /// A straight chain: each backend falls through to the one after it,
    /// the last one is terminal.
    pub fn chain(backends: Vec<Arc<dyn Backend>>, timeout: Duration) -> Self {
        let last = backends.len().saturating_sub(1);
        let steps = backends
            .into_iter()
            .enumerate()
            .map(|(i, backend)| {
                let on_failure = if i < last {
                    OnFailure::Next(i + 1)
                } else {
                    OnFailure::Terminal
                };
                PlanStep::new(backend, on_failure).with_timeout(timeout)
            })
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Walk the plan until a backend answers or a terminal step fails.
    pub async fn run(
        &self,
        messages: &[ChatTurn],
    ) -> std::result::Result<String, GenerationError> {
        let mut index = 0;

        while let Some(step) = self.steps.get(index) {
            let backend_name = step.backend.name().to_string();

            info!(
                backend = %backend_name,
                step = index,
                total = self.steps.len(),
                "Fallback: trying backend"
            );

            let error = match tokio::time::timeout(step.timeout, step.backend.answer(messages)).await
            {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "Backend '{}' timed out after {}s",
                    backend_name,
                    step.timeout.as_secs()
                )),
            };

            let kind = FailureKind::classify(&error);
            match step.on_failure {
                OnFailure::Next(next) => {
                    warn!(
                        backend = %backend_name,
                        error = %error,
                        kind = ?kind,
                        next,
                        "Fallback: backend failed, trying next"
                    );
                    index = next;
                }
                OnFailure::Terminal => {
                    warn!(
                        backend = %backend_name,
                        error = %error,
                        kind = ?kind,
                        "Fallback: backend failed, plan exhausted"
                    );
                    return Err(GenerationError::Backend {
                        backend: display_name(&backend_name),
                        source: error,
                    });
                }
            }
        }

        Err(GenerationError::NoBackends)
    }
}

/// "openai" → "OpenAI", "groq" → "Groq"; anything else is capitalized.
fn display_name(name: &str) -> String {
    match name {
        "openai" => "OpenAI".to_string(),
        _ => {
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A mock backend that answers from a script, one entry per call.
    struct ScriptedBackend {
        name: String,
        script: Mutex<Vec<std::result::Result<String, ProviderError>>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn new(name: &str, script: Vec<std::result::Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                script: Mutex::new(script.into_iter().rev().collect()),
                call_count: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn answer(&self, _messages: &[ChatTurn]) -> std::result::Result<String, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
        }
    }

    /// A backend that never answers.
    struct HangingBackend;

    #[async_trait]
    impl Backend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn answer(&self, _messages: &[ChatTurn]) -> std::result::Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".into())
        }
    }

    fn api_error(message: &str) -> ProviderError {
        ProviderError::ApiError {
            status_code: 500,
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn first_step_success_skips_the_rest() {
        let primary = ScriptedBackend::new("openai", vec![Ok("hi".into())]);
        let secondary = ScriptedBackend::new("groq", vec![Ok("unused".into())]);
        let plan = FallbackPlan::new(vec![
            PlanStep::new(primary.clone(), OnFailure::Next(1)),
            PlanStep::new(secondary.clone(), OnFailure::Terminal),
        ])
        .unwrap();

        assert_eq!(plan.run(&[]).await.unwrap(), "hi");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn failure_follows_next_index() {
        let primary = ScriptedBackend::new("openai", vec![Err(api_error("boom"))]);
        let secondary = ScriptedBackend::new("groq", vec![Ok("rescued".into())]);
        let plan = FallbackPlan::new(vec![
            PlanStep::new(primary.clone(), OnFailure::Next(1)),
            PlanStep::new(secondary.clone(), OnFailure::Terminal),
        ])
        .unwrap();

        assert_eq!(plan.run(&[]).await.unwrap(), "rescued");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn terminal_failure_wraps_backend_message() {
        let primary = ScriptedBackend::new("openai", vec![Err(api_error("model overloaded"))]);
        let plan = FallbackPlan::new(vec![PlanStep::new(primary, OnFailure::Terminal)]).unwrap();

        let err = plan.run(&[]).await.unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("OpenAI error:"), "got: {text}");
        assert!(text.contains("model overloaded"));
        assert!(matches!(err, GenerationError::Backend { .. }));
    }

    #[tokio::test]
    async fn next_can_skip_steps() {
        let a = ScriptedBackend::new("a", vec![Err(api_error("down"))]);
        let b = ScriptedBackend::new("b", vec![Ok("never".into())]);
        let c = ScriptedBackend::new("c", vec![Ok("from c".into())]);
        let plan = FallbackPlan::new(vec![
            PlanStep::new(a, OnFailure::Next(2)),
            PlanStep::new(b.clone(), OnFailure::Terminal),
            PlanStep::new(c, OnFailure::Terminal),
        ])
        .unwrap();

        assert_eq!(plan.run(&[]).await.unwrap(), "from c");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let secondary = ScriptedBackend::new("groq", vec![Ok("after timeout".into())]);
        let plan = FallbackPlan::new(vec![
            PlanStep::new(Arc::new(HangingBackend), OnFailure::Next(1))
                .with_timeout(Duration::from_secs(5)),
            PlanStep::new(secondary.clone(), OnFailure::Terminal),
        ])
        .unwrap();

        assert_eq!(plan.run(&[]).await.unwrap(), "after timeout");
        assert_eq!(secondary.calls(), 1);
    }

    #[test]
    fn chain_links_steps_forward() {
        let a: Arc<dyn Backend> = ScriptedBackend::new("a", vec![]);
        let b: Arc<dyn Backend> = ScriptedBackend::new("b", vec![]);
        let plan = FallbackPlan::chain(vec![a, b], Duration::from_secs(1));
        let hops: Vec<_> = plan.steps().iter().map(PlanStep::on_failure).collect();
        assert_eq!(hops, vec![OnFailure::Next(1), OnFailure::Terminal]);
    }

    #[tokio::test]
    async fn empty_plan_has_no_backends() {
        let plan = FallbackPlan::new(vec![]).unwrap();
        assert!(plan.is_empty());
        assert!(matches!(plan.run(&[]).await, Err(GenerationError::NoBackends)));
    }

    #[test]
    fn backward_and_out_of_range_jumps_are_rejected() {
        let backend = ScriptedBackend::new("x", vec![]);
        let self_loop = FallbackPlan::new(vec![PlanStep::new(backend.clone(), OnFailure::Next(0))]);
        assert_eq!(self_loop.err(), Some(PlanError { step: 0, target: 0 }));

        let dangling = FallbackPlan::new(vec![
            PlanStep::new(backend.clone(), OnFailure::Next(1)),
            PlanStep::new(backend, OnFailure::Next(5)),
        ]);
        assert_eq!(dangling.err(), Some(PlanError { step: 1, target: 5 }));
    }

    #[test]
    fn classify_quota_and_auth_messages() {
        assert_eq!(
            FailureKind::classify(&api_error("You exceeded your current quota")),
            FailureKind::QuotaOrAuth
        );
        assert_eq!(
            FailureKind::classify(&api_error("Insufficient balance")),
            FailureKind::QuotaOrAuth
        );
        assert_eq!(
            FailureKind::classify(&api_error("Incorrect API key provided")),
            FailureKind::QuotaOrAuth
        );
        assert_eq!(
            FailureKind::classify(&ProviderError::AuthenticationFailed("nope".into())),
            FailureKind::QuotaOrAuth
        );
        assert_eq!(
            FailureKind::classify(&api_error("model overloaded")),
            FailureKind::Other
        );
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("openai"), "OpenAI");
        assert_eq!(display_name("groq"), "Groq");
        assert_eq!(display_name(""), "");
    }
}
