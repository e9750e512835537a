//! Core type definitions for mintbridge.
//!
//! This crate defines the run-scoped data model shared by the sync engine
//! and the binary:
//! - Half-open time windows that bound one sync run
//! - Forward-only page cursors
//! - Raw source records and their natural keys
//! - Per-record outcomes and the aggregate run summary
//!
//! Nothing here performs I/O and nothing here outlives a single run.

mod cursor;
mod outcome;
mod record;
mod window;

pub use cursor::PageCursor;
pub use outcome::{DestinationId, RunSummary, SyncOutcome};
pub use record::{EntityKind, SourceRecord, key_text};
pub use window::TimeWindow;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
