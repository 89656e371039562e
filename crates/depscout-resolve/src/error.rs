//! Error types for the resolution pipeline

use std::path::PathBuf;

use depscout_registry::RegistryError;
use thiserror::Error;

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur while resolving dependencies.
///
/// Per-package failures never surface here; they degrade to an unresolved
/// record. These errors cover setup problems and collaborator plumbing.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Invalid configuration
    #[error("Invalid configuration: {reason}. Expected: {expected}")]
    InvalidConfiguration {
        /// Reason why configuration is invalid
        reason: String,
        /// What was expected
        expected: String,
    },

    /// Configuration source could not be loaded
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Cache operation failed
    #[error("Cache error during {operation}: {reason}")]
    CacheError {
        /// Operation being performed (get, set, clear, etc.)
        operation: String,
        /// Reason for cache error
        reason: String,
    },

    /// IO error with context
    #[error("IO error at {path}: {reason}")]
    IoError {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Reason for IO error
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {reason}. Format: {format}")]
    SerializationError {
        /// Reason for serialization error
        reason: String,
        /// Format being serialized (JSON, TOML)
        format: String,
    },

    /// Registry call failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// An external collaborator (fingerprinting, detectors) failed
    #[error("Collaborator {name} failed: {reason}")]
    Collaborator {
        /// Collaborator name
        name: String,
        /// Reason for the failure
        reason: String,
    },
}

impl ResolveError {
    /// Create a collaborator error
    pub fn collaborator(name: impl Into<String>, reason: impl ToString) -> Self {
        ResolveError::Collaborator {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::SerializationError {
            reason: err.to_string(),
            format: "JSON".to_string(),
        }
    }
}

impl From<toml::de::Error> for ResolveError {
    fn from(err: toml::de::Error) -> Self {
        ResolveError::SerializationError {
            reason: err.to_string(),
            format: "TOML".to_string(),
        }
    }
}

impl From<toml::ser::Error> for ResolveError {
    fn from(err: toml::ser::Error) -> Self {
        ResolveError::SerializationError {
            reason: err.to_string(),
            format: "TOML".to_string(),
        }
    }
}
