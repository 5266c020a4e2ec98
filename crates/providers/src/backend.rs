//! Backends: one vendor plus the ordered list of models to try on it.
//!
//! A fallback plan step calls a [`Backend`], not a raw [`Provider`]: the
//! backend owns model selection and sampling settings, so "try the next
//! model" stays inside the backend and "try the next vendor" stays in the plan.

use async_trait::async_trait;
use folio_core::error::ProviderError;
use folio_core::message::ChatTurn;
use folio_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Something that can turn chat turns into answer text.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    async fn answer(&self, messages: &[ChatTurn]) -> std::result::Result<String, ProviderError>;
}

/// A provider walked through an ordered model list.
///
/// The first model that succeeds wins. When every model fails, the error
/// observed on the last one is returned. A model that does not answer
/// within the chain's timeout counts as failed.
pub struct ModelChain {
    provider: Arc<dyn Provider>,
    models: Vec<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl ModelChain {
    pub fn new(provider: Arc<dyn Provider>, models: Vec<String>) -> Self {
        Self {
            provider,
            models,
            temperature: 0.3,
            max_tokens: None,
            timeout: None,
        }
    }

    /// A chain over a single model.
    pub fn single(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::new(provider, vec![model.into()])
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Bound each model attempt separately.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[async_trait]
impl Backend for ModelChain {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn answer(&self, messages: &[ChatTurn]) -> std::result::Result<String, ProviderError> {
        let mut last_error = ProviderError::NotConfigured(format!(
            "No models configured for '{}'",
            self.provider.name()
        ));

        for (i, model) in self.models.iter().enumerate() {
            info!(
                provider = %self.provider.name(),
                model = %model,
                attempt = i + 1,
                total = self.models.len(),
                "Model chain: trying model"
            );

            let request = ProviderRequest {
                model: model.clone(),
                messages: messages.to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let outcome = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.provider.complete(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::Timeout(format!(
                            "Model '{}' timed out after {}s",
                            model,
                            limit.as_secs()
                        )))
                    }),
                None => self.provider.complete(request).await,
            };

            match outcome {
                Ok(response) => return Ok(response.content),
                Err(e) => {
                    warn!(
                        provider = %self.provider.name(),
                        model = %model,
                        error = %e,
                        "Model chain: model failed, trying next"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::provider::ProviderResponse;
    use std::sync::Mutex;

    /// Fails for every model listed in `failing`, answers with the model name otherwise.
    struct PerModelProvider {
        failing: Vec<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for PerModelProvider {
        fn name(&self) -> &str {
            "per_model"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.model.clone());
            if self.failing.contains(&request.model.as_str()) {
                return Err(ProviderError::ApiError {
                    status_code: 404,
                    message: format!("model {} decommissioned", request.model),
                });
            }
            Ok(ProviderResponse {
                content: format!("answer from {}", request.model),
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn first_successful_model_wins() {
        let provider = Arc::new(PerModelProvider {
            failing: vec!["big"],
            seen: Mutex::new(vec![]),
        });
        let chain = ModelChain::new(provider.clone(), vec!["big".into(), "small".into(), "tiny".into()]);

        let text = chain.answer(&[ChatTurn::user("q")]).await.unwrap();
        assert_eq!(text, "answer from small");
        assert_eq!(*provider.seen.lock().unwrap(), vec!["big", "small"]);
    }

    #[tokio::test]
    async fn all_models_failing_returns_last_error() {
        let provider = Arc::new(PerModelProvider {
            failing: vec!["a", "b"],
            seen: Mutex::new(vec![]),
        });
        let chain = ModelChain::new(provider, vec!["a".into(), "b".into()]);

        let err = chain.answer(&[ChatTurn::user("q")]).await.unwrap_err();
        assert!(err.to_string().contains("model b decommissioned"));
    }

    #[tokio::test]
    async fn empty_model_list_is_not_configured() {
        let provider = Arc::new(PerModelProvider {
            failing: vec![],
            seen: Mutex::new(vec![]),
        });
        let chain = ModelChain::new(provider, vec![]);
        assert!(matches!(
            chain.answer(&[]).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }

    /// Never answers for `slow`, answers with the model name otherwise.
    struct StallingProvider;

    #[async_trait]
    impl Provider for StallingProvider {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            if request.model == "slow" {
                std::future::pending::<()>().await;
            }
            Ok(ProviderResponse {
                content: format!("answer from {}", request.model),
                model: request.model,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_model_times_out_and_next_model_answers() {
        let chain = ModelChain::new(Arc::new(StallingProvider), vec!["slow".into(), "fast".into()])
            .with_timeout(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let text = chain.answer(&[ChatTurn::user("q")]).await.unwrap();

        assert_eq!(text, "answer from fast");
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn every_model_stalling_reports_timeout() {
        let chain = ModelChain::single(Arc::new(StallingProvider), "slow")
            .with_timeout(Duration::from_secs(2));

        let err = chain.answer(&[ChatTurn::user("q")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn request_carries_sampling_settings() {
        struct Capture(Mutex<Option<ProviderRequest>>);

        #[async_trait]
        impl Provider for Capture {
            fn name(&self) -> &str {
                "capture"
            }
            async fn complete(
                &self,
                request: ProviderRequest,
            ) -> std::result::Result<ProviderResponse, ProviderError> {
                *self.0.lock().unwrap() = Some(request.clone());
                Ok(ProviderResponse {
                    content: String::new(),
                    model: request.model,
                })
            }
        }

        let provider = Arc::new(Capture(Mutex::new(None)));
        let chain = ModelChain::single(provider.clone(), "m")
            .with_temperature(0.2)
            .with_max_tokens(Some(1024));
        chain.answer(&[ChatTurn::user("q")]).await.unwrap();

        let request = provider.0.lock().unwrap().take().unwrap();
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, Some(1024));
    }
}
