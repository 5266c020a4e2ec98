//! Configuration loading, validation, and management for Folio.
//!
//! Loads configuration from `~/.folio/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.folio/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation backends and fallback preference
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Page text selection
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Text anchoring on the rendering side
    #[serde(default)]
    pub anchor: AnchorConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Document, page text, and transcript storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice transcription and synthesis
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

// --- Generation ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Which backend to call first. Naming the secondary backend skips the
    /// primary entirely.
    #[serde(default = "default_preference")]
    pub preference: String,

    /// Per-model attempt timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "BackendConfig::default_primary")]
    pub primary: BackendConfig,

    #[serde(default = "BackendConfig::default_secondary")]
    pub secondary: BackendConfig,
}

fn default_preference() -> String {
    "openai".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            preference: default_preference(),
            timeout_secs: default_timeout_secs(),
            primary: BackendConfig::default_primary(),
            secondary: BackendConfig::default_secondary(),
        }
    }
}

impl GenerationConfig {
    /// Whether the preference names the secondary backend.
    pub fn prefers_secondary(&self) -> bool {
        self.preference.eq_ignore_ascii_case(&self.secondary.name)
    }
}

/// One hosted backend: a vendor endpoint plus the models to try, in order.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    pub models: Vec<String>,

    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl BackendConfig {
    pub fn default_primary() -> Self {
        Self {
            name: "openai".into(),
            api_key: None,
            api_url: None,
            models: vec!["gpt-4o-mini".into()],
            temperature: 0.3,
            max_tokens: None,
        }
    }

    pub fn default_secondary() -> Self {
        Self {
            name: "groq".into(),
            api_key: None,
            api_url: None,
            models: vec!["llama3-70b-8192".into(), "llama3-8b-8192".into()],
            temperature: 0.2,
            max_tokens: Some(1024),
        }
    }

    /// A backend counts as configured once it has an API key.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("models", &self.models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// --- Retrieval ---

/// Upper bound on `retrieval.max_matches`.
pub const MAX_RETRIEVED_PAGES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Only this many leading characters of the question are searched for
    #[serde(default = "default_query_prefix_chars")]
    pub query_prefix_chars: usize,

    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    /// Pages used when nothing matches
    #[serde(default = "default_fallback_pages")]
    pub fallback_pages: usize,

    /// Per-page prompt budget, in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_query_prefix_chars() -> usize {
    200
}
fn default_max_matches() -> usize {
    4
}
fn default_fallback_pages() -> usize {
    3
}
fn default_snippet_chars() -> usize {
    2000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_prefix_chars: default_query_prefix_chars(),
            max_matches: default_max_matches(),
            fallback_pages: default_fallback_pages(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

// --- Anchoring ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Delay between text-layer lookups
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a page whose text layer has not mounted after this many lookups
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_poll_interval_ms() -> u64 {
    120
}
fn default_max_polls() -> u32 {
    50
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

// --- Gateway ---

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Bearer token → user ID. Requests without a listed token get 401.
    #[serde(default)]
    pub api_tokens: HashMap<String, String>,

    /// Extra CORS origins allowed to call the API
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_tokens: HashMap::new(),
            allowed_origins: vec![],
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("api_tokens", &format!("[{} REDACTED]", self.api_tokens.len()))
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

// --- Storage ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "sqlite"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_database_url() -> String {
    "sqlite://folio.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url: default_database_url(),
        }
    }
}

// --- Speech ---

#[derive(Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Falls back to the primary backend's key when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_transcription_model() -> String {
    "whisper-1".into()
}
fn default_speech_model() -> String {
    "gpt-4o-mini-tts".into()
}
fn default_voice() -> String {
    "alloy".into()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_url: None,
            transcription_model: default_transcription_model(),
            speech_model: default_speech_model(),
            voice: default_voice(),
        }
    }
}

impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("transcription_model", &self.transcription_model)
            .field("speech_model", &self.speech_model)
            .field("voice", &self.voice)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.folio/config.toml).
    ///
    /// Also checks environment variables:
    /// - `LLM_PROVIDER`: backend preference
    /// - `OPENAI_API_KEY`: primary key (and speech key) when unset in the file
    /// - `GROQ_API_KEY`: secondary key when unset in the file
    /// - `FOLIO_DATABASE_URL`: storage URL
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(preference) = var("LLM_PROVIDER") {
            self.generation.preference = preference.to_lowercase();
        }

        let openai_key = var("OPENAI_API_KEY");
        if self.generation.primary.api_key.is_none() {
            self.generation.primary.api_key = openai_key.clone();
        }
        if self.speech.api_key.is_none() {
            self.speech.api_key = openai_key.or_else(|| self.generation.primary.api_key.clone());
        }

        if self.generation.secondary.api_key.is_none() {
            self.generation.secondary.api_key = var("GROQ_API_KEY");
        }

        if let Some(url) = var("FOLIO_DATABASE_URL") {
            self.storage.url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".folio")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for backend in [&self.generation.primary, &self.generation.secondary] {
            if backend.temperature < 0.0 || backend.temperature > 2.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}: temperature must be between 0.0 and 2.0",
                    backend.name
                )));
            }
            if backend.models.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{}: at least one model is required",
                    backend.name
                )));
            }
        }

        if self.anchor.poll_interval_ms == 0 || self.anchor.max_polls == 0 {
            return Err(ConfigError::ValidationError(
                "anchor.poll_interval_ms and anchor.max_polls must be > 0".into(),
            ));
        }

        if !(1..=MAX_RETRIEVED_PAGES).contains(&self.retrieval.max_matches) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.max_matches must be between 1 and {MAX_RETRIEVED_PAGES}"
            )));
        }

        if self.retrieval.fallback_pages == 0 || self.retrieval.snippet_chars == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.fallback_pages and retrieval.snippet_chars must be > 0".into(),
            ));
        }

        match self.storage.backend.as_str() {
            "memory" | "sqlite" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "storage.backend must be \"memory\" or \"sqlite\", got \"{other}\""
            ))),
        }
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
