//! Generation gateway: one prompt in, one answer out.
//!
//! The gateway owns a [`FallbackPlan`] and the system instructions that fix
//! the answer's output contract. It fails only once the plan is exhausted.

use crate::backend::Backend;
use crate::fallback::FallbackPlan;
use folio_core::error::GenerationError;
use folio_core::message::ChatTurn;
use std::sync::Arc;
use std::time::Duration;

pub struct GenerationGateway {
    plan: FallbackPlan,
    system_prompt: Option<String>,
}

impl GenerationGateway {
    pub fn new(plan: FallbackPlan) -> Self {
        Self {
            plan,
            system_prompt: None,
        }
    }

    /// Call one backend and propagate whatever it returns.
    pub fn direct(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self::new(FallbackPlan::chain(vec![backend], timeout))
    }

    /// Primary first; on any failure fall through to the secondary when one
    /// is configured, otherwise surface the primary's error.
    pub fn with_fallback(
        primary: Arc<dyn Backend>,
        secondary: Option<Arc<dyn Backend>>,
        timeout: Duration,
    ) -> Self {
        let mut backends = vec![primary];
        backends.extend(secondary);
        Self::new(FallbackPlan::chain(backends, timeout))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn plan(&self) -> &FallbackPlan {
        &self.plan
    }

    /// Names of the backends in the order they will be tried.
    pub fn backend_names(&self) -> Vec<&str> {
        self.plan.steps().iter().map(|s| s.backend_name()).collect()
    }

    /// Answer a fully built prompt.
    pub async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatTurn::system(system.as_str()));
        }
        messages.push(ChatTurn::user(prompt));
        self.plan.run(&messages).await
    }
}
