//! Unified error type for customer API operations.
//!
//! Every fallible operation in this crate returns `Result<T, ApiError>`.
//! Errors are values, never panics; only [`ApiError::Auth`] ever triggers
//! implicit recovery (the single refresh-and-replay in the gateway). All
//! other variants are surfaced to the caller to decide on retry.

use thiserror::Error;

/// Errors that can occur when interacting with the customer API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected locally before any network call (quantity bounds, empty
    /// input, operation called in the wrong state).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authorization failed and could not be recovered by a token refresh.
    /// The session has been torn down when this is returned.
    #[error("authentication required: {0}")]
    Auth(String),

    /// The server reported a structured failure (insufficient stock, invalid
    /// coupon, duplicate default address, ...). Carries the server message
    /// verbatim.
    #[error("{0}")]
    Business(String),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON envelope.
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The server returned a non-success status without a readable envelope.
    #[error("server error: HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Request URL could not be built from the configured base.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Durable token storage failed.
    #[error("token store error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ApiError {
    /// Whether the failure was transport-level and a manual retry of the
    /// same request may succeed.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_) | Self::Server { .. })
    }

    /// Whether the caller should treat the session as gone and route to an
    /// unauthenticated state.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;
