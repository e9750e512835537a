//! Lazy traversal of a paginated source listing.
//!
//! [`PaginatedFetcher::fetch_all`] returns a [`RecordPager`] that requests
//! pages only as records are pulled. Each call to `fetch_all` starts over at
//! the first page; a pager itself only moves forward.

use crate::error::{SyncError, SyncResult};
use crate::source::{ListFilters, Page, PageToken, PaginationStyle, SourceFeed};
use futures::Stream;
use mintbridge_types::{EntityKind, SourceRecord, TimeWindow};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Starts traversals over one source feed.
#[derive(Clone)]
pub struct PaginatedFetcher {
    feed: Arc<dyn SourceFeed>,
}

impl PaginatedFetcher {
    pub fn new(feed: Arc<dyn SourceFeed>) -> Self {
        Self { feed }
    }

    pub fn feed(&self) -> &Arc<dyn SourceFeed> {
        &self.feed
    }

    pub fn kind(&self) -> EntityKind {
        self.feed.kind()
    }

    /// Begins a fresh traversal of every record in `window`.
    ///
    /// Nothing is requested until the first record is pulled.
    pub fn fetch_all(&self, window: TimeWindow, filters: ListFilters) -> RecordPager {
        RecordPager {
            feed: Arc::clone(&self.feed),
            window,
            filters,
            buffer: VecDeque::new(),
            next: NextPage::Request(PageToken::first(self.feed.pagination())),
            pages_fetched: 0,
            cancel: None,
        }
    }
}

enum NextPage {
    Request(PageToken),
    Exhausted,
}

/// A forward-only, finite sequence of source records.
///
/// The pager stops at the first of: an empty page, a missing or repeated
/// cursor, the last reported page, or the feed's page cap. A failed page
/// request ends the sequence; records already handed out stay handed out.
pub struct RecordPager {
    feed: Arc<dyn SourceFeed>,
    window: TimeWindow,
    filters: ListFilters,
    buffer: VecDeque<SourceRecord>,
    next: NextPage,
    pages_fetched: u32,
    cancel: Option<CancellationToken>,
}

impl RecordPager {
    /// Checks `token` before every page request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Returns true once no further page will be requested.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.next, NextPage::Exhausted)
    }

    /// Pulls the next record, fetching a page if the buffer is empty.
    ///
    /// Returns `Ok(None)` once the traversal is over. Page failures surface as
    /// `SyncError::Fetch` (credential and cancellation errors keep their own
    /// kind), after which the pager yields nothing more.
    pub async fn next_record(&mut self) -> SyncResult<Option<SourceRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }

            let token = match &self.next {
                NextPage::Exhausted => return Ok(None),
                NextPage::Request(token) => token.clone(),
            };

            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                self.next = NextPage::Exhausted;
                return Err(SyncError::Cancelled);
            }

            if self.pages_fetched >= self.feed.max_pages() {
                warn!(
                    kind = %self.feed.kind(),
                    pages = self.pages_fetched,
                    "Page cap reached, ending traversal"
                );
                self.next = NextPage::Exhausted;
                return Ok(None);
            }

            debug!(page = %token, "Requesting page");
            let page = match self.feed.fetch_page(&self.window, &self.filters, &token).await {
                Ok(page) => page,
                Err(e) => {
                    self.next = NextPage::Exhausted;
                    return Err(e.into_fetch());
                }
            };
            self.pages_fetched += 1;

            info!(
                kind = %self.feed.kind(),
                page = %token,
                records = page.records.len(),
                "Fetched page"
            );

            self.next = self.advance(&token, &page);
            self.buffer.extend(page.records);
        }
    }

    /// Drains the rest of the sequence into a vector.
    pub async fn collect_all(mut self) -> SyncResult<Vec<SourceRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Adapts the pager into a `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = SyncResult<SourceRecord>> + Send {
        futures::stream::try_unfold(self, |mut pager| async move {
            Ok::<_, SyncError>(pager.next_record().await?.map(|record| (record, pager)))
        })
    }

    fn advance(&self, current: &PageToken, page: &Page) -> NextPage {
        if page.records.is_empty() {
            return NextPage::Exhausted;
        }

        match (current, self.feed.pagination()) {
            (PageToken::Cursor(sent), _) => {
                let next = &page.next_cursor;
                if next.is_start() {
                    NextPage::Exhausted
                } else if next == sent {
                    warn!(cursor = %next, "Upstream repeated the cursor, ending traversal");
                    NextPage::Exhausted
                } else {
                    NextPage::Request(PageToken::Cursor(next.clone()))
                }
            }
            (PageToken::Number(n), style) => {
                let first_page = match style {
                    PaginationStyle::Numbered { first_page } => first_page,
                    PaginationStyle::Cursor => 0,
                };
                let visited = n.saturating_sub(first_page).saturating_add(1);
                match page.total_pages {
                    Some(total) if visited >= total => NextPage::Exhausted,
                    _ => NextPage::Request(PageToken::Number(n.saturating_add(1))),
                }
            }
        }
    }
}
