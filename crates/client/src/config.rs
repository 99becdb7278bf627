//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CLOVEMART_API_BASE_URL` - Base URL of the customer API, including the
//!   `/customer` prefix (e.g., `https://shop.example.com/api/customer`)
//!
//! ## Optional
//! - `CLOVEMART_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `CLOVEMART_TOKEN_PATH` - File used to persist the access token across
//!   runs; without it the token lives in memory only

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Customer API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the customer API. Always stored with a trailing slash so
    /// relative endpoint paths join underneath it instead of replacing the
    /// final path segment.
    pub base_url: Url,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Durable token storage location, if any.
    pub token_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Create a configuration for the given base URL with defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url, "base_url")?,
            timeout: Duration::from_secs(30),
            token_path: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(
            &get_required_env("CLOVEMART_API_BASE_URL")?,
            "CLOVEMART_API_BASE_URL",
        )?;

        let timeout_secs = get_env_or_default("CLOVEMART_HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CLOVEMART_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let token_path = get_optional_env("CLOVEMART_TOKEN_PATH").map(PathBuf::from);

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            token_path,
        })
    }

    /// Set the durable token storage path.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse and normalize a base URL (trailing slash required for `Url::join`).
fn parse_base_url(raw: &str, var_name: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
