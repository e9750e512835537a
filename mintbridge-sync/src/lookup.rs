//! Finding an existing destination entity by natural key.
//!
//! Mintsoft has no "get by order number / SKU" endpoint, so every lookup
//! reads the paginated listing. [`ScanLookup`] does that per call;
//! [`IndexedLookup`] reads the listing once per run and answers from memory.

use crate::destination::{Destination, DestinationEntry};
use crate::error::SyncResult;
use async_trait::async_trait;
use mintbridge_types::DestinationId;
use std::collections::HashMap;
use std::ops::ControlFlow;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Resolves natural keys to destination identifiers.
#[async_trait]
pub trait KeyLookup: Send + Sync {
    /// Returns the id of the entity with `natural_key`, or `None` if absent.
    async fn find(
        &self,
        destination: &dyn Destination,
        natural_key: &str,
    ) -> SyncResult<Option<DestinationId>>;

    /// Records an entity created during this run.
    async fn remember(&self, natural_key: &str, id: &DestinationId);
}

/// Scans the listing on every call, stopping at the first match.
#[derive(Debug, Default)]
pub struct ScanLookup;

#[async_trait]
impl KeyLookup for ScanLookup {
    async fn find(
        &self,
        destination: &dyn Destination,
        natural_key: &str,
    ) -> SyncResult<Option<DestinationId>> {
        let mut found = None;
        scan_listing(destination, |entries| {
            match entries.into_iter().find(|entry| entry.natural_key == natural_key) {
                Some(entry) => {
                    found = Some(entry.id);
                    ControlFlow::Break(())
                }
                None => ControlFlow::Continue(()),
            }
        })
        .await?;

        debug!(natural_key, found = found.is_some(), "Scanned destination listing");
        Ok(found)
    }

    async fn remember(&self, _natural_key: &str, _id: &DestinationId) {}
}

/// Reads the whole listing on first use and keeps it current with creates.
///
/// A scan that fails part-way is discarded, so the next call starts over.
#[derive(Debug, Default)]
pub struct IndexedLookup {
    index: Mutex<Option<HashMap<String, DestinationId>>>,
}

impl IndexedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed keys, or `None` before the first lookup.
    pub async fn len(&self) -> Option<usize> {
        self.index.lock().await.as_ref().map(HashMap::len)
    }

    async fn build(destination: &dyn Destination) -> SyncResult<HashMap<String, DestinationId>> {
        let mut index = HashMap::new();
        scan_listing(destination, |entries| {
            for entry in entries {
                index.entry(entry.natural_key).or_insert(entry.id);
            }
            ControlFlow::Continue(())
        })
        .await?;

        info!(kind = %destination.kind(), keys = index.len(), "Built destination key index");
        Ok(index)
    }
}

#[async_trait]
impl KeyLookup for IndexedLookup {
    async fn find(
        &self,
        destination: &dyn Destination,
        natural_key: &str,
    ) -> SyncResult<Option<DestinationId>> {
        let mut slot = self.index.lock().await;
        if slot.is_none() {
            *slot = Some(Self::build(destination).await?);
        }
        Ok(slot
            .as_ref()
            .and_then(|index| index.get(natural_key))
            .cloned())
    }

    async fn remember(&self, natural_key: &str, id: &DestinationId) {
        if let Some(index) = self.index.lock().await.as_mut() {
            index.insert(natural_key.to_string(), id.clone());
        }
    }
}

/// Walks listing pages from 1 until a page with no rows, a `Break`, or the cap.
async fn scan_listing<F>(destination: &dyn Destination, mut visit: F) -> SyncResult<()>
where
    F: FnMut(Vec<DestinationEntry>) -> ControlFlow<()> + Send,
{
    let max_pages = destination.max_pages();
    for page in 1..=max_pages {
        let listing = destination.list_page(page).await?;
        if listing.is_end() {
            return Ok(());
        }
        if visit(listing.entries).is_break() {
            return Ok(());
        }
    }

    warn!(
        kind = %destination.kind(),
        max_pages,
        "Listing scan hit the page cap; later entries were not examined"
    );
    Ok(())
}
