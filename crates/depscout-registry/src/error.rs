//! Registry error types

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry client errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Network request failed
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Invalid registry URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy configuration
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// Unexpected HTTP status from the registry
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Package or version does not exist on the registry
    #[error("Not found on registry: {name}")]
    NotFound { name: String },

    /// Retry limit exceeded
    #[error("Retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    /// Response body could not be decoded
    #[error("Failed to decode registry response for {name}: {reason}")]
    Decode { name: String, reason: String },

    /// Client build error
    #[error("Failed to build registry client: {0}")]
    BuildError(String),
}

impl RegistryError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::RequestFailed(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RegistryError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Whether the error is a definitive "does not exist" answer
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}
