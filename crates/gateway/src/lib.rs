//! HTTP API gateway for Folio.
//!
//! Exposes the chat turn, chat history, document registration, and the
//! speech conversions under `/api`, plus an unauthenticated health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use folio_agent::TurnRunner;
use folio_config::AppConfig;
use folio_core::speech::SpeechBackend;
use folio_core::store::PageStore;
use folio_providers::OpenAiSpeech;
use folio_store::Store;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Audio uploads go through the same router, so the limit is sized for a
/// short voice recording rather than a JSON body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// User the gateway acts as when no API tokens are configured.
pub const LOCAL_USER: &str = "local";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub runner: Arc<TurnRunner>,
    pub speech: Option<Arc<dyn SpeechBackend>>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, runner: Arc<TurnRunner>) -> Self {
        Self {
            config,
            store,
            runner,
            speech: None,
        }
    }

    /// Wire the turn runner and speech backend from configuration.
    pub fn from_config(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let runner = TurnRunner::from_config(&config, store.clone()).with_transcripts(store.clone());

        let speech: Option<Arc<dyn SpeechBackend>> = if config.speech.enabled {
            let mut speech_config = config.speech.clone();
            if speech_config.api_key.is_none() {
                speech_config.api_key = config.generation.primary.api_key.clone();
            }
            Some(Arc::new(OpenAiSpeech::from_config(&speech_config)))
        } else {
            None
        };

        Self {
            speech,
            ..Self::new(config, store, Arc::new(runner))
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechBackend>) -> Self {
        self.speech = Some(speech);
        self
    }
}

/// The authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Bearer token authentication on all /api routes
/// - CORS limited to the configured origins
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/chat", post(api::chat))
        .route("/chat/history", get(api::chat_history))
        .route("/ensure-session", get(api::ensure_session))
        .route("/docs", post(api::register_document))
        .route("/docs/{id}", get(api::get_document))
        .route("/speech-to-text", post(api::speech_to_text))
        .route("/text-to-speech", post(api::text_to_speech))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = folio_store::open(&config.storage).await?;
    info!(backend = store.name(), "Storage ready");

    if config.gateway.api_tokens.is_empty() {
        warn!(user = LOCAL_USER, "No API tokens configured; every request is treated as the local user");
    }

    let state = Arc::new(GatewayState::from_config(config, store));
    info!(
        backends = ?state.runner.backend_names(),
        speech = state.speech.is_some(),
        "Generation gateway ready"
    );

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Authentication middleware for the /api routes.
///
/// Requires `Authorization: Bearer <token>` with a token listed in
/// `gateway.api_tokens`, and attaches the token's user as [`CurrentUser`].
/// With no tokens configured every request runs as [`LOCAL_USER`].
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Response {
    let tokens = &state.config.gateway.api_tokens;

    let user = if tokens.is_empty() {
        Some(LOCAL_USER.to_string())
    } else {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| tokens.get(token.trim()))
            .cloned()
    };

    match user {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        None => {
            warn!(path = %req.uri().path(), "Unauthorized request, missing or invalid bearer token");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use folio_agent::{ContextSelector, PromptBuilder};
    use folio_core::store::ChatStore;
    use folio_providers::GenerationGateway;
    use folio_store::InMemoryStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub(crate) fn test_state(answer: &str) -> SharedState {
        let store = Arc::new(InMemoryStore::new());
        let gateway = GenerationGateway::direct(
            Arc::new(api::tests::FixedBackend(answer.into())),
            std::time::Duration::from_secs(5),
        );
        let runner = TurnRunner::new(
            ContextSelector::new(store.clone(), Default::default()),
            PromptBuilder::default(),
            Arc::new(gateway),
        );
        Arc::new(GatewayState::new(AppConfig::default(), store, Arc::new(runner)))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state("ok"));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    fn with_tokens(state: SharedState) -> SharedState {
        let mut config = state.config.clone();
        config
            .gateway
            .api_tokens
            .insert("secret-token".into(), "alice".into());
        Arc::new(GatewayState::new(config, state.store.clone(), state.runner.clone()))
    }

    #[tokio::test]
    async fn api_requires_bearer_token_when_tokens_configured() {
        let app = build_router(with_tokens(test_state("ok")));

        let req = Request::builder()
            .uri("/api/ensure-session?documentId=d1")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Unauthorized");
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let app = build_router(with_tokens(test_state("ok")));

        let req = Request::builder()
            .uri("/api/ensure-session?documentId=d1")
            .header("Authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_acts_as_its_user() {
        let state = with_tokens(test_state("ok"));
        let app = build_router(state.clone());

        let req = Request::builder()
            .uri("/api/ensure-session?documentId=d1")
            .header("Authorization", "Bearer secret-token")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = state
            .store
            .latest_session("alice", &"d1".into())
            .await
            .unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_router(with_tokens(test_state("ok")));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn speech_follows_config() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let mut config = AppConfig::default();
        config.speech.enabled = false;
        assert!(GatewayState::from_config(config.clone(), store.clone()).speech.is_none());

        config.speech.enabled = true;
        assert!(GatewayState::from_config(config, store).speech.is_some());
    }
}
