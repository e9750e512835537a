//! Per-record outcomes and run aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to an entity by the destination platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for DestinationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Result of synchronizing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Created or updated; carries the destination identifier.
    Success(DestinationId),
    /// The requested entity does not exist at the source.
    NotFound,
    /// The record's data is unusable; retrying will not help.
    ValidationError(String),
    /// A retryable failure (5xx, network, credential refresh).
    TransientError(String),
}

impl SyncOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }

    /// Returns the destination id of a successful outcome.
    #[must_use]
    pub fn destination_id(&self) -> Option<&DestinationId> {
        match self {
            SyncOutcome::Success(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the failure reason, if this outcome is a failure.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            SyncOutcome::Success(_) => None,
            SyncOutcome::NotFound => Some("not found"),
            SyncOutcome::ValidationError(reason) | SyncOutcome::TransientError(reason) => {
                Some(reason)
            }
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Success(id) => write!(f, "success (id {id})"),
            SyncOutcome::NotFound => write!(f, "not found"),
            SyncOutcome::ValidationError(reason) => write!(f, "validation error: {reason}"),
            SyncOutcome::TransientError(reason) => write!(f, "transient error: {reason}"),
        }
    }
}

/// Aggregate counters for one run.
///
/// Invariant: `total == success + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl RunSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one outcome.
    pub fn record(&mut self, outcome: &SyncOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} success={} failed={}",
            self.total, self.success, self.failed
        )
    }
}
