//! Error types for the upstream client

use thiserror::Error;

/// Upstream client error types
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Numeric code carried on terminal error events. Falls back to 500
    /// when the failure has no HTTP status of its own.
    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamError::Api { status, .. } => *status,
            UpstreamError::Http(err) => err.status().map(|s| s.as_u16()).unwrap_or(500),
            _ => 500,
        }
    }
}

/// Result type alias for upstream operations
pub type Result<T> = std::result::Result<T, UpstreamError>;
