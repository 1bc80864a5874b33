//! Error types for tickmon-api.

use thiserror::Error;

/// Errors from the collaborator REST surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Result type alias for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
