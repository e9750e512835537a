//! Error types for the sync layer.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credential exchange failed. Fatal to the run.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A listing page could not be retrieved. Fatal to the run.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A single record's data is unusable.
    #[error("validation error: {0}")]
    Validation(String),

    /// A retryable failure (5xx, network, timeout).
    #[error("transient error: {0}")]
    Transient(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled from outside.
    #[error("run cancelled")]
    Cancelled,
}

impl SyncError {
    /// Classifies a non-success HTTP status.
    ///
    /// 4xx → `Validation`, anything else (5xx, unexpected 1xx/3xx) → `Transient`.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };

        if status.is_client_error() {
            SyncError::Validation(message)
        } else {
            SyncError::Transient(message)
        }
    }

    /// Wraps a transport-level failure (connect, timeout, body read).
    pub fn from_transport(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Transient(format!("{context}: request timed out"))
        } else {
            SyncError::Transient(format!("{context}: {err}"))
        }
    }

    /// Re-labels a request failure as a pagination failure.
    ///
    /// Credential and cancellation errors keep their own kind.
    pub fn into_fetch(self) -> Self {
        match self {
            SyncError::Auth(_) | SyncError::Cancelled | SyncError::Config(_) | SyncError::Fetch(_) => {
                self
            }
            other => SyncError::Fetch(other.to_string()),
        }
    }

    /// Returns true if this error must abort the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Auth(_) | SyncError::Fetch(_) | SyncError::Config(_) | SyncError::Cancelled
        )
    }
}
