//! Half-open time windows.
//!
//! A window bounds both the remote listing requests of a run and the set of
//! records the run is responsible for. `since` is included, `until` is not.

use crate::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open interval `[since, until)` of UTC instants.
///
/// Construction enforces `since < until`; a window can therefore never be
/// empty or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting `since >= until`.
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since >= until {
            return Err(Error::InvalidWindow(format!(
                "since ({}) must be before until ({})",
                format_instant(since),
                format_instant(until)
            )));
        }
        Ok(Self { since, until })
    }

    /// Creates the window of length `span` that ends at `now`.
    ///
    /// A span reaching past the representable range is an invalid window.
    pub fn trailing(now: DateTime<Utc>, span: Duration) -> Result<Self> {
        let since = now.checked_sub_signed(span).ok_or_else(|| {
            Error::InvalidWindow(format!(
                "span of {span} before {} is out of range",
                format_instant(now)
            ))
        })?;
        Self::new(since, now)
    }

    /// Parses a window from two RFC 3339 strings.
    pub fn parse(since: &str, until: &str) -> Result<Self> {
        Self::new(parse_instant(since)?, parse_instant(until)?)
    }

    /// Returns the inclusive start.
    #[must_use]
    pub const fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Returns the exclusive end.
    #[must_use]
    pub const fn until(&self) -> DateTime<Utc> {
        self.until
    }

    /// Returns the length of the window.
    #[must_use]
    pub fn span(&self) -> Duration {
        self.until - self.since
    }

    /// Returns true if `instant` falls inside `[since, until)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since <= instant && instant < self.until
    }

    /// Wire form of `since`, e.g. `2024-01-01T00:00:00Z`.
    #[must_use]
    pub fn since_param(&self) -> String {
        format_instant(self.since)
    }

    /// Wire form of `until`.
    #[must_use]
    pub fn until_param(&self) -> String {
        format_instant(self.until)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.since_param(), self.until_param())
    }
}

impl<'de> Deserialize<'de> for TimeWindow {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        }

        let raw = Raw::deserialize(deserializer)?;
        TimeWindow::new(raw.since, raw.until).map_err(serde::de::Error::custom)
    }
}

/// Formats an instant the way the remote APIs expect it.
fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp(format!("{value}: {e}")))
}
