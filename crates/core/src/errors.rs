//! Error types for the taskflow core crate.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the entity store and its backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote backend could not be reached at all. During initial load
    /// this triggers degraded mode instead of failing the caller.
    #[error("remote backend unavailable: {0}")]
    RemoteUnavailable(String),

    /// A specific remote write failed. The cache is left at its
    /// last-known-good state. Carries the HTTP status when one arrived so
    /// callers can pick a retry policy without re-parsing the message.
    #[error("remote write failed: {message}")]
    RemoteWrite {
        status: Option<u16>,
        message: String,
    },

    /// The target row no longer exists remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected before any remote call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a remote-unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable(message.into())
    }

    /// Create a remote-write error with no known HTTP status
    pub fn write(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            status: None,
            message: message.into(),
        }
    }

    /// Create a remote-write error carrying the HTTP status
    pub fn write_status(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the target row vanished remotely; callers react with a
    /// forced re-fetch.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// HTTP status of a remote-write failure, when one arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteWrite { status, .. } => *status,
            _ => None,
        }
    }
}
