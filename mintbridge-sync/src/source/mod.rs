//! Source platform feeds.
//!
//! A feed knows how to request one page of a time-filtered listing and how
//! to fetch a single entity by natural key. Traversal across pages lives in
//! [`crate::pagination`], so a feed never loops.

pub mod dsco;

pub use dsco::{DscoItemFeed, DscoOrderFeed};

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use mintbridge_types::{EntityKind, PageCursor, SourceRecord, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a listing endpoint continues past its first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// The response hands back an opaque cursor for the next page.
    Cursor,
    /// Pages are numbered, starting at `first_page`.
    Numbered { first_page: u32 },
}

/// Position of the page being requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    Cursor(PageCursor),
    Number(u32),
}

impl PageToken {
    /// The token for the first page of a listing in `style`.
    pub fn first(style: PaginationStyle) -> Self {
        match style {
            PaginationStyle::Cursor => PageToken::Cursor(PageCursor::start()),
            PaginationStyle::Numbered { first_page } => PageToken::Number(first_page),
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageToken::Cursor(cursor) => write!(f, "cursor {cursor}"),
            PageToken::Number(n) => write!(f, "page {n}"),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<SourceRecord>,
    /// Cursor for the following page; start (empty) when there is none.
    pub next_cursor: PageCursor,
    /// Total page count, when the endpoint reports one.
    pub total_pages: Option<u32>,
}

/// Which timestamp the run window filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateField {
    #[default]
    Created,
    Updated,
    RetailerCreated,
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::Created => write!(f, "created"),
            DateField::Updated => write!(f, "updated"),
            DateField::RetailerCreated => write!(f, "retailer-created"),
        }
    }
}

impl FromStr for DateField {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(DateField::Created),
            "updated" => Ok(DateField::Updated),
            "retailer-created" | "retailer_created" => Ok(DateField::RetailerCreated),
            other => Err(SyncError::Config(format!("unknown date field: {other}"))),
        }
    }
}

/// Filters applied on top of the time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilters {
    pub date_field: DateField,
    /// Upstream lifecycle status, e.g. `released`.
    pub status: Option<String>,
}

impl ListFilters {
    pub fn with_date_field(mut self, date_field: DateField) -> Self {
        self.date_field = date_field;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// A time-filtered listing plus single-entity lookup on the source platform.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// The entity kind this feed yields.
    fn kind(&self) -> EntityKind;

    /// How this feed's listing paginates.
    fn pagination(&self) -> PaginationStyle;

    /// Upper bound on pages per traversal.
    fn max_pages(&self) -> u32;

    /// Obtains a credential, failing with `SyncError::Auth` if refused.
    async fn authenticate(&self) -> SyncResult<()>;

    /// Fetches one listing page.
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        filters: &ListFilters,
        token: &PageToken,
    ) -> SyncResult<Page>;

    /// Fetches one entity by natural key. `Ok(None)` when the source has none.
    async fn fetch_one(&self, natural_key: &str) -> SyncResult<Option<SourceRecord>>;
}
