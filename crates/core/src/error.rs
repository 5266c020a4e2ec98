//! Error types for the Folio domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; only [`GenerationError`]
//! is ever meant to reach the end user.

use thiserror::Error;

/// A single backend call failed.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Every configured generation backend has been exhausted.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("{backend} error: {source}")]
    Backend {
        backend: String,
        #[source]
        source: ProviderError,
    },

    #[error("No generation backend configured")]
    NoBackends,
}

/// Page text could not be read. Always recovered locally.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// A document, session, or chat turn could not be written or read back.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// The trailing directive line of an answer could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveParseError {
    #[error("No directive line found")]
    NoCandidate,

    #[error("Malformed directive line: {0}")]
    Malformed(String),
}
