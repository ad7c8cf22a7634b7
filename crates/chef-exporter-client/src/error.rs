//! Error types for the Chef client

use thiserror::Error;

/// Errors that can occur when talking to a Chef server
#[derive(Error, Debug)]
pub enum ChefError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Request exceeded the configured deadline
    #[error("Request timed out")]
    Timeout,

    /// Chef server returned an error status
    #[error("Chef API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body returned by the server
        message: String,
    },

    /// Request could not be signed
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl ChefError {
    /// Whether the server rejected our credentials
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ChefError::Api { status: 401 | 403, .. })
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChefError::Timeout
        } else {
            ChefError::Http(err)
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ChefError>;
