//! Backend router: turns configuration into a ready generation gateway.

use crate::backend::{Backend, ModelChain};
use crate::gateway::GenerationGateway;
use crate::openai_compat::OpenAiCompatProvider;
use folio_config::{BackendConfig, GenerationConfig};
use folio_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the vendor client for one backend block.
pub fn build_provider(config: &BackendConfig) -> Arc<dyn Provider> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.name));
    let api_key = config.api_key.clone().unwrap_or_default();
    Arc::new(OpenAiCompatProvider::new(&config.name, base_url, api_key))
}

/// Wrap a backend block's provider in its model chain, each model bounded
/// by `model_timeout`.
pub fn build_backend(config: &BackendConfig, model_timeout: Duration) -> Arc<dyn Backend> {
    Arc::new(
        ModelChain::new(build_provider(config), config.models.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(model_timeout),
    )
}

/// Time a backend may spend walking its whole model list.
pub fn backend_timeout(model_timeout: Duration, backends: &[&BackendConfig]) -> Duration {
    let longest_chain = backends.iter().map(|b| b.models.len()).max().unwrap_or(1).max(1);
    model_timeout.saturating_mul(u32::try_from(longest_chain).unwrap_or(u32::MAX))
}

/// Build the gateway the configuration describes.
///
/// - preference names the secondary → secondary only, no fallback
/// - otherwise primary, then secondary if it has credentials
///
/// `timeout_secs` bounds each model attempt; a backend step is bounded by
/// that times the length of its model list.
pub fn build_from_config(config: &GenerationConfig) -> GenerationGateway {
    let model_timeout = Duration::from_secs(config.timeout_secs);

    let gateway = if config.prefers_secondary() {
        GenerationGateway::direct(
            build_backend(&config.secondary, model_timeout),
            backend_timeout(model_timeout, &[&config.secondary]),
        )
    } else {
        let secondary = config
            .secondary
            .is_configured()
            .then(|| build_backend(&config.secondary, model_timeout));
        GenerationGateway::with_fallback(
            build_backend(&config.primary, model_timeout),
            secondary,
            backend_timeout(model_timeout, &[&config.primary, &config.secondary]),
        )
    };

    info!(
        backends = ?gateway.backend_names(),
        "Generation gateway ready"
    );
    gateway
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert_eq!(default_base_url("openai"), "https://api.openai.com/v1");
        assert_eq!(default_base_url("groq"), "https://api.groq.com/openai/v1");
        assert!(default_base_url("acme").contains("acme"));
    }

    #[test]
    fn unconfigured_secondary_is_left_out() {
        let config = GenerationConfig::default();
        let gateway = build_from_config(&config);
        assert_eq!(gateway.backend_names(), vec!["openai"]);
    }

    #[test]
    fn configured_secondary_follows_primary() {
        let mut config = GenerationConfig::default();
        config.secondary.api_key = Some("gsk-test".into());
        let gateway = build_from_config(&config);
        assert_eq!(gateway.backend_names(), vec!["openai", "groq"]);
    }

    #[test]
    fn preferring_secondary_drops_primary() {
        let mut config = GenerationConfig::default();
        config.preference = "groq".into();
        config.primary.api_key = Some("sk-test".into());
        let gateway = build_from_config(&config);
        assert_eq!(gateway.backend_names(), vec!["groq"]);
    }

    #[test]
    fn backend_step_leaves_room_for_every_model() {
        let mut config = GenerationConfig::default();
        config.primary.models = vec!["a".into(), "b".into(), "c".into()];
        config.secondary.models = vec!["x".into()];
        let model_timeout = Duration::from_secs(10);

        assert_eq!(
            backend_timeout(model_timeout, &[&config.primary, &config.secondary]),
            Duration::from_secs(30)
        );
        assert_eq!(backend_timeout(model_timeout, &[&config.secondary]), model_timeout);
        config.secondary.models.clear();
        assert_eq!(backend_timeout(model_timeout, &[&config.secondary]), model_timeout);
    }

    #[tokio::test]
    async fn preferred_secondary_without_key_reports_missing_key() {
        let mut config = GenerationConfig::default();
        config.preference = "groq".into();
        let gateway = build_from_config(&config);

        let err = gateway.generate("q").await.unwrap_err().to_string();
        assert!(err.contains("GROQ_API_KEY missing"), "got: {err}");
    }
}
