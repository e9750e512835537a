//! Drives one complete sync run.
//!
//! A run moves `Idle → Fetching → Reconciling* → Finished`, or ends early in
//! `Aborted` (credential or page failure) or `Cancelled`. Records are handled
//! strictly one at a time; a record that fails is counted and skipped.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pagination::PaginatedFetcher;
use crate::reconciler::Reconciler;
use crate::source::{DscoItemFeed, DscoOrderFeed, ListFilters, SourceFeed};
use chrono::{DateTime, Duration, Utc};
use mintbridge_types::{EntityKind, RunSummary, SyncOutcome, TimeWindow};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Reconciling,
    Finished,
    Aborted,
    Cancelled,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Finished => "finished",
            RunPhase::Aborted => "aborted",
            RunPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Counts for a run plus the reason it stopped early, if it did.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub aborted: Option<SyncError>,
}

impl RunReport {
    /// Returns true if the run reached the end of the listing.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.aborted, Some(SyncError::Cancelled))
    }

    pub fn phase(&self) -> RunPhase {
        match &self.aborted {
            None => RunPhase::Finished,
            Some(SyncError::Cancelled) => RunPhase::Cancelled,
            Some(_) => RunPhase::Aborted,
        }
    }

    /// The summary of a completed run, or the error that cut it short.
    pub fn into_result(self) -> SyncResult<RunSummary> {
        match self.aborted {
            None => Ok(self.summary),
            Some(e) => Err(e),
        }
    }
}

/// Pulls records from a source feed and reconciles each one.
pub struct SyncOrchestrator {
    fetcher: PaginatedFetcher,
    reconciler: Reconciler,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn SourceFeed>, reconciler: Reconciler) -> SyncResult<Self> {
        if source.kind() != reconciler.kind() {
            return Err(SyncError::Config(format!(
                "source yields {} records but destination holds {}",
                source.kind(),
                reconciler.kind()
            )));
        }
        Ok(Self {
            fetcher: PaginatedFetcher::new(source),
            reconciler,
            cancel: CancellationToken::new(),
        })
    }

    /// Builds the DSCO feed and Mintsoft reconciler for `kind`.
    pub fn from_config(kind: EntityKind, config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let source: Arc<dyn SourceFeed> = match kind {
            EntityKind::Order => Arc::new(DscoOrderFeed::from_config(&config.source)?),
            EntityKind::Product => Arc::new(DscoItemFeed::from_config(&config.source)?),
        };
        let reconciler = Reconciler::from_config(kind, &config.destination, &config.mapping)?;
        Self::new(source, reconciler)
    }

    /// Replaces the run's cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this orchestrator's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn kind(&self) -> EntityKind {
        self.fetcher.kind()
    }

    /// Synchronizes every source record in `window`.
    ///
    /// Always returns a report. Per-record failures are counted; credential
    /// and page failures stop the run and are returned in `aborted` next to
    /// the counts gathered so far. A record whose destination call hits a
    /// credential failure is counted as failed before the run stops.
    pub async fn run(&self, window: TimeWindow, filters: &ListFilters) -> RunReport {
        let kind = self.kind();
        let mut summary = RunSummary::new();
        info!(
            %kind,
            %window,
            date_field = %filters.date_field,
            status = filters.status.as_deref().unwrap_or("any"),
            "Starting sync run"
        );

        if let Err(e) = self.preflight().await {
            return finish(summary, Some(e), 0);
        }

        let mut phase = RunPhase::Fetching;
        debug!(%phase, "Run phase");
        let mut pager = self
            .fetcher
            .fetch_all(window, filters.clone())
            .with_cancellation(self.cancel.clone());

        loop {
            if self.cancel.is_cancelled() {
                return finish(summary, Some(SyncError::Cancelled), pager.pages_fetched());
            }

            let record = match pager.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => return finish(summary, Some(e), pager.pages_fetched()),
            };

            if phase != RunPhase::Reconciling {
                phase = RunPhase::Reconciling;
                debug!(%phase, "Run phase");
            }

            let natural_key = record.natural_key().unwrap_or_default();
            let outcome = match self.reconciler.try_reconcile(&record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let failed = SyncOutcome::TransientError(e.to_string());
                    summary.record(&failed);
                    log_outcome(kind, &natural_key, &failed);
                    return finish(summary, Some(e), pager.pages_fetched());
                }
            };
            summary.record(&outcome);
            log_outcome(kind, &natural_key, &outcome);
        }

        finish(summary, None, pager.pages_fetched())
    }

    /// Synchronizes the single source entity with `natural_key`.
    pub async fn sync_one(&self, natural_key: &str) -> SyncOutcome {
        let kind = self.kind();
        let natural_key = natural_key.trim();
        if natural_key.is_empty() {
            return SyncOutcome::ValidationError(format!("empty {}", kind.key_name()));
        }

        info!(%kind, natural_key, "Syncing single entity");
        let outcome = match self.fetcher.feed().fetch_one(natural_key).await {
            Ok(Some(record)) => self.reconciler.reconcile(&record).await,
            Ok(None) => SyncOutcome::NotFound,
            Err(e) => SyncOutcome::TransientError(e.to_string()),
        };
        log_outcome(kind, natural_key, &outcome);
        outcome
    }

    async fn preflight(&self) -> SyncResult<()> {
        self.fetcher.feed().authenticate().await?;
        self.reconciler.authenticate().await?;
        debug!("Preflight authentication succeeded");
        Ok(())
    }
}

/// The trailing window of `config.default_window_hours` ending at `now`.
pub fn default_window(config: &SyncConfig, now: DateTime<Utc>) -> SyncResult<TimeWindow> {
    let span = Duration::try_hours(config.default_window_hours).ok_or_else(|| {
        SyncError::Config(format!(
            "default_window_hours out of range: {}",
            config.default_window_hours
        ))
    })?;
    TimeWindow::trailing(now, span).map_err(|e| SyncError::Config(e.to_string()))
}

fn finish(summary: RunSummary, aborted: Option<SyncError>, pages: u32) -> RunReport {
    let report = RunReport { summary, aborted };
    let phase = report.phase();
    let summary = &report.summary;

    match &report.aborted {
        None => info!(
            %phase,
            pages,
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            "Sync run finished"
        ),
        Some(SyncError::Cancelled) => warn!(
            %phase,
            pages,
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            "Sync run cancelled"
        ),
        Some(e) => error!(
            %phase,
            pages,
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            error = %e,
            "Sync run aborted"
        ),
    }
    report
}

fn log_outcome(kind: EntityKind, natural_key: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Success(id) => info!(%kind, natural_key, %id, "Synced"),
        SyncOutcome::NotFound => warn!(%kind, natural_key, "Not found at source"),
        SyncOutcome::ValidationError(reason) => {
            warn!(%kind, natural_key, reason = reason.as_str(), "Skipped invalid record");
        }
        SyncOutcome::TransientError(reason) => {
            warn!(%kind, natural_key, reason = reason.as_str(), "Record failed");
        }
    }
}
