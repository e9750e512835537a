//! Per-record create-or-update against the destination.

use crate::config::{DestinationConfig, MappingConfig};
use crate::destination::{Destination, MintsoftDestination};
use crate::error::{SyncError, SyncResult};
use crate::lookup::{IndexedLookup, KeyLookup, ScanLookup};
use crate::mapping::{DestinationPayload, RecordMapper, mapper_for};
use mintbridge_types::{DestinationId, EntityKind, SourceRecord, SyncOutcome};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Upserts single records by natural key.
///
/// `reconcile` never returns an error: every failure is folded into a
/// [`SyncOutcome`]. Running it twice for the same record leaves one
/// destination entity, because creation only happens after a lookup miss.
pub struct Reconciler {
    destination: Arc<dyn Destination>,
    mapper: Arc<dyn RecordMapper>,
    lookup: Arc<dyn KeyLookup>,
}

impl Reconciler {
    pub fn new(
        destination: Arc<dyn Destination>,
        mapper: Arc<dyn RecordMapper>,
        lookup: Arc<dyn KeyLookup>,
    ) -> SyncResult<Self> {
        if destination.kind() != mapper.kind() {
            return Err(SyncError::Config(format!(
                "mapper produces {} payloads but destination holds {}",
                mapper.kind(),
                destination.kind()
            )));
        }
        Ok(Self {
            destination,
            mapper,
            lookup,
        })
    }

    /// Wires a Mintsoft destination, the matching mapper and the configured
    /// lookup strategy.
    pub fn from_config(
        kind: EntityKind,
        destination: &DestinationConfig,
        mapping: &MappingConfig,
    ) -> SyncResult<Self> {
        let lookup: Arc<dyn KeyLookup> = if destination.index_lookups {
            Arc::new(IndexedLookup::new())
        } else {
            Arc::new(ScanLookup)
        };
        Self::new(
            Arc::new(MintsoftDestination::from_config(kind, destination)?),
            mapper_for(kind, mapping),
            lookup,
        )
    }

    pub fn kind(&self) -> EntityKind {
        self.destination.kind()
    }

    /// Obtains a destination credential.
    pub async fn authenticate(&self) -> SyncResult<()> {
        self.destination.authenticate().await
    }

    /// Creates or updates the destination entity for `record`.
    ///
    /// Every failure becomes an outcome, credential failures included.
    pub async fn reconcile(&self, record: &SourceRecord) -> SyncOutcome {
        self.try_reconcile(record)
            .await
            .unwrap_or_else(outcome_for_error)
    }

    /// Like [`Reconciler::reconcile`], but hands back errors that must stop
    /// the whole run (see [`SyncError::is_run_fatal`]) instead of folding
    /// them into the record's outcome.
    #[instrument(
        skip(self, record),
        fields(kind = %record.kind(), natural_key = %record.natural_key().unwrap_or_default())
    )]
    pub async fn try_reconcile(&self, record: &SourceRecord) -> SyncResult<SyncOutcome> {
        let payload = match self.mapper.map(record) {
            Ok(payload) => payload,
            Err(e) => return Ok(outcome_for_error(e)),
        };

        match self.upsert(&payload).await {
            Ok(id) => Ok(SyncOutcome::Success(id)),
            Err(e) if e.is_run_fatal() => Err(e),
            Err(e) => Ok(outcome_for_error(e)),
        }
    }

    async fn upsert(&self, payload: &DestinationPayload) -> SyncResult<DestinationId> {
        let key = payload.natural_key();
        match self.lookup.find(self.destination.as_ref(), key).await? {
            Some(existing) => {
                debug!(natural_key = key, id = %existing, "Found existing entity, updating");
                self.destination.update(&existing, payload).await
            }
            None => {
                debug!(natural_key = key, "No existing entity, creating");
                let id = self.destination.create(payload).await?;
                self.lookup.remember(key, &id).await;
                Ok(id)
            }
        }
    }
}

/// Folds an error into a per-record outcome.
///
/// Bad data (mapping failures, 4xx answers) is a validation error; anything
/// else, including a credential failure mid-run, is transient.
pub fn outcome_for_error(err: SyncError) -> SyncOutcome {
    match err {
        SyncError::Validation(reason) => SyncOutcome::ValidationError(reason),
        SyncError::Serialization(e) => SyncOutcome::ValidationError(e.to_string()),
        other => SyncOutcome::TransientError(other.to_string()),
    }
}
