mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub streaming: StreamingMode,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// LLM backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Backend base URL (e.g. "http://localhost:8080" or "https://api.openai.com")
    pub url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// API key for backend authentication (Bearer)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Completion token cap
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// System prompt for the demo conversation chain
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for backend connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
    /// Path to client certificate for mTLS
    pub client_cert_path: Option<String>,
    /// Path to client private key for mTLS
    pub client_key_path: Option<String>,
}

fn default_timeout() -> u64 {
    300
}

impl LlmConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_capacity() -> u64 {
    1024
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Token streaming mode for chain endpoints
///
/// - `Off`: run the chain to completion and return its outputs as JSON
/// - `Text`: SSE stream of raw token text events
/// - `Json`: SSE stream of `{"token": ...}` events
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    Off,
    #[default]
    Text,
    Json,
}

impl StreamingMode {
    /// Returns true if responses are delivered over SSE
    pub fn is_streaming(&self) -> bool {
        !matches!(self, StreamingMode::Off)
    }

    /// Returns true if token events carry JSON payloads
    pub fn is_json(&self) -> bool {
        matches!(self, StreamingMode::Json)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Validate semantic constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.llm.url).map_err(|e| {
            ConfigError::Validation(format!("invalid llm.url '{}': {}", self.llm.url, e))
        })?;

        if self.llm.model.is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }

        if let Some(ref tls) = self.llm.tls {
            if tls.client_cert_path.is_some() != tls.client_key_path.is_some() {
                return Err(ConfigError::Validation(
                    "client_cert_path and client_key_path must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
