//! Destination platform (Mintsoft) clients.

pub mod mintsoft;

pub use mintsoft::MintsoftDestination;

use crate::error::SyncResult;
use crate::mapping::DestinationPayload;
use async_trait::async_trait;
use mintbridge_types::{DestinationId, EntityKind};

/// One row of a destination listing, reduced to what key lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationEntry {
    pub natural_key: String,
    pub id: DestinationId,
}

/// One listing page: the usable entries plus how many rows the page held.
///
/// Rows without a key or id are dropped from `entries` but still counted, so
/// a page of unusable rows is not mistaken for the end of the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub rows: usize,
    pub entries: Vec<DestinationEntry>,
}

impl ListingPage {
    /// A page whose rows were all usable.
    pub fn from_entries(entries: Vec<DestinationEntry>) -> Self {
        Self {
            rows: entries.len(),
            entries,
        }
    }

    /// Returns true when the page held no rows at all.
    pub fn is_end(&self) -> bool {
        self.rows == 0
    }
}

/// Create/update access to one entity collection on the destination.
///
/// The destination offers no lookup by natural key, only a numbered listing;
/// see [`crate::lookup`] for how that listing is searched.
#[async_trait]
pub trait Destination: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Upper bound on listing pages read per scan.
    fn max_pages(&self) -> u32;

    /// Obtains a credential, failing with `SyncError::Auth` if refused.
    async fn authenticate(&self) -> SyncResult<()>;

    /// Reads one listing page. Pages are numbered from 1; a page with no
    /// rows means the listing is exhausted.
    async fn list_page(&self, page: u32) -> SyncResult<ListingPage>;

    /// Creates an entity and returns its new identifier.
    async fn create(&self, payload: &DestinationPayload) -> SyncResult<DestinationId>;

    /// Updates the entity identified by `id`.
    async fn update(&self, id: &DestinationId, payload: &DestinationPayload)
    -> SyncResult<DestinationId>;
}
