use async_trait::async_trait;
use futures::TryStreamExt;
use mintbridge_sync::source::{ListFilters, Page, PageToken, PaginationStyle, SourceFeed};
use mintbridge_sync::{PaginatedFetcher, SyncError, SyncResult};
use mintbridge_types::{EntityKind, PageCursor, SourceRecord, TimeWindow};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// A feed answering from a fixed table of pages, keyed by the token text.
struct ScriptedFeed {
    style: PaginationStyle,
    max_pages: u32,
    pages: HashMap<String, Page>,
    failures: HashMap<String, fn() -> SyncError>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    fn new(style: PaginationStyle) -> Self {
        Self {
            style,
            max_pages: 200,
            pages: HashMap::new(),
            failures: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn page(mut self, key: &str, page: Page) -> Self {
        self.pages.insert(key.to_string(), page);
        self
    }

    fn fail(mut self, key: &str, error: fn() -> SyncError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }

    fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn token_key(token: &PageToken) -> String {
    match token {
        PageToken::Cursor(cursor) => cursor.token().unwrap_or("start").to_string(),
        PageToken::Number(n) => n.to_string(),
    }
}

#[async_trait]
impl SourceFeed for ScriptedFeed {
    fn kind(&self) -> EntityKind {
        EntityKind::Order
    }

    fn pagination(&self) -> PaginationStyle {
        self.style
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }

    async fn authenticate(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn fetch_page(
        &self,
        _window: &TimeWindow,
        _filters: &ListFilters,
        token: &PageToken,
    ) -> SyncResult<Page> {
        let key = token_key(token);
        self.requests.lock().unwrap().push(key.clone());
        if let Some(error) = self.failures.get(&key) {
            return Err(error());
        }
        Ok(self.pages.get(&key).cloned().unwrap_or_default())
    }

    async fn fetch_one(&self, _natural_key: &str) -> SyncResult<Option<SourceRecord>> {
        Ok(None)
    }
}

fn orders(prefix: &str, count: usize) -> Vec<SourceRecord> {
    (0..count)
        .map(|i| SourceRecord::new(EntityKind::Order, json!({"orderNumber": format!("{prefix}-{i}")})))
        .collect()
}

fn cursor_page(records: Vec<SourceRecord>, next: Option<&str>) -> Page {
    Page {
        records,
        next_cursor: PageCursor::from_option(next.map(str::to_string)),
        total_pages: None,
    }
}

fn numbered_page(records: Vec<SourceRecord>, total_pages: Option<u32>) -> Page {
    Page {
        records,
        next_cursor: PageCursor::start(),
        total_pages,
    }
}

fn window() -> TimeWindow {
    TimeWindow::parse("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z").unwrap()
}

fn keys(records: &[SourceRecord]) -> Vec<String> {
    records.iter().filter_map(SourceRecord::natural_key).collect()
}

// ── Cursor traversal ────────────────────────────────────────────

#[tokio::test]
async fn cursor_pages_are_visited_until_empty_page() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 50), Some("c1")))
            .page("c1", cursor_page(orders("b", 1), Some("c2")))
            .page("c2", cursor_page(Vec::new(), Some("c3"))),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 51);
    assert_eq!(feed.requests(), vec!["start", "c1", "c2"]);

    let unique: HashSet<String> = keys(&records).into_iter().collect();
    assert_eq!(unique.len(), 51);
}

#[tokio::test]
async fn missing_cursor_ends_traversal() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor).page("start", cursor_page(orders("a", 3), None)),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(feed.requests(), vec!["start"]);
}

#[tokio::test]
async fn empty_cursor_string_ends_traversal() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 2), Some(""))),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(feed.requests().len(), 1);
}

#[tokio::test]
async fn empty_page_is_terminal_even_with_a_cursor() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(Vec::new(), Some("c1")))
            .page("c1", cursor_page(orders("a", 5), None)),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(feed.requests(), vec!["start"]);
}

#[tokio::test]
async fn repeated_cursor_is_terminal() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 2), Some("same")))
            .page("same", cursor_page(orders("b", 2), Some("same"))),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(feed.requests(), vec!["start", "same"]);
}

#[tokio::test]
async fn records_are_pulled_lazily() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 2), Some("c1")))
            .page("c1", cursor_page(orders("b", 2), None)),
    );

    let mut pager = PaginatedFetcher::new(feed.clone()).fetch_all(window(), ListFilters::default());
    assert!(feed.requests().is_empty());

    pager.next_record().await.unwrap();
    pager.next_record().await.unwrap();
    assert_eq!(feed.requests(), vec!["start"]);
    assert_eq!(pager.pages_fetched(), 1);

    pager.next_record().await.unwrap();
    assert_eq!(feed.requests(), vec!["start", "c1"]);
}

#[tokio::test]
async fn fetch_all_restarts_from_the_first_page() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 1), Some("c1")))
            .page("c1", cursor_page(orders("b", 1), None)),
    );
    let fetcher = PaginatedFetcher::new(feed.clone());

    let first = fetcher.fetch_all(window(), ListFilters::default()).collect_all().await.unwrap();
    let second = fetcher.fetch_all(window(), ListFilters::default()).collect_all().await.unwrap();

    assert_eq!(keys(&first), keys(&second));
    assert_eq!(feed.requests(), vec!["start", "c1", "start", "c1"]);
}

// ── Numbered traversal ──────────────────────────────────────────

#[tokio::test]
async fn numbered_pages_stop_at_total_page_count() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Numbered { first_page: 0 })
            .page("0", numbered_page(orders("a", 2), Some(3)))
            .page("1", numbered_page(orders("b", 2), Some(3)))
            .page("2", numbered_page(orders("c", 2), Some(3)))
            .page("3", numbered_page(orders("d", 2), Some(3))),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(feed.requests(), vec!["0", "1", "2"]);
}

#[tokio::test]
async fn one_based_pages_respect_total_page_count() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Numbered { first_page: 1 })
            .page("1", numbered_page(orders("a", 2), Some(2)))
            .page("2", numbered_page(orders("b", 1), Some(2))),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(feed.requests(), vec!["1", "2"]);
}

#[tokio::test]
async fn numbered_pages_without_total_run_until_empty() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Numbered { first_page: 1 })
            .page("1", numbered_page(orders("a", 2), None))
            .page("2", numbered_page(orders("b", 2), None)),
    );

    let records = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(feed.requests(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn page_cap_ends_traversal() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Numbered { first_page: 0 })
            .page("0", numbered_page(orders("a", 1), None))
            .page("1", numbered_page(orders("b", 1), None))
            .page("2", numbered_page(orders("c", 1), None))
            .with_max_pages(2),
    );

    let mut pager = PaginatedFetcher::new(feed.clone()).fetch_all(window(), ListFilters::default());
    let mut count = 0;
    while pager.next_record().await.unwrap().is_some() {
        count += 1;
    }

    assert_eq!(count, 2);
    assert_eq!(feed.requests(), vec!["0", "1"]);
    assert!(pager.is_exhausted());
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn failed_page_keeps_yielded_records_and_ends_sequence() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 2), Some("c1")))
            .fail("c1", || SyncError::Transient("HTTP 502".into())),
    );

    let mut pager = PaginatedFetcher::new(feed.clone()).fetch_all(window(), ListFilters::default());
    assert!(pager.next_record().await.unwrap().is_some());
    assert!(pager.next_record().await.unwrap().is_some());

    let err = pager.next_record().await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch(ref msg) if msg.contains("502")));

    assert!(pager.next_record().await.unwrap().is_none());
    assert_eq!(feed.requests(), vec!["start", "c1"]);
}

#[tokio::test]
async fn auth_failure_keeps_its_kind() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .fail("start", || SyncError::Auth("token revoked".into())),
    );

    let err = PaginatedFetcher::new(feed)
        .fetch_all(window(), ListFilters::default())
        .collect_all()
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
}

#[tokio::test]
async fn cancelled_pager_requests_nothing() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor).page("start", cursor_page(orders("a", 2), None)),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut pager = PaginatedFetcher::new(feed.clone())
        .fetch_all(window(), ListFilters::default())
        .with_cancellation(cancel);

    assert!(matches!(pager.next_record().await, Err(SyncError::Cancelled)));
    assert!(feed.requests().is_empty());
}

// ── Stream adapter ──────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_every_record() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 3), Some("c1")))
            .page("c1", cursor_page(orders("b", 2), None)),
    );

    let records: Vec<SourceRecord> = PaginatedFetcher::new(feed)
        .fetch_all(window(), ListFilters::default())
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(
        keys(&records),
        vec!["a-0", "a-1", "a-2", "b-0", "b-1"]
    );
}

#[tokio::test]
async fn stream_surfaces_fetch_error() {
    let feed = Arc::new(
        ScriptedFeed::new(PaginationStyle::Cursor)
            .page("start", cursor_page(orders("a", 1), Some("c1")))
            .fail("c1", || SyncError::Transient("timeout".into())),
    );

    let result: SyncResult<Vec<SourceRecord>> = PaginatedFetcher::new(feed)
        .fetch_all(window(), ListFilters::default())
        .into_stream()
        .try_collect()
        .await;
    assert!(matches!(result, Err(SyncError::Fetch(_))));
}

// ── Properties ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn cursor_traversal_yields_each_record_once(sizes in prop::collection::vec(1usize..20, 1..6)) {
        let mut feed = ScriptedFeed::new(PaginationStyle::Cursor);
        let mut expected = 0;
        for (i, size) in sizes.iter().enumerate() {
            let key = if i == 0 { "start".to_string() } else { format!("c{i}") };
            let next = (i + 1 < sizes.len()).then(|| format!("c{}", i + 1));
            feed = feed.page(&key, cursor_page(orders(&format!("p{i}"), *size), next.as_deref()));
            expected += size;
        }
        let feed = Arc::new(feed);

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let records = runtime
            .block_on(PaginatedFetcher::new(feed.clone()).fetch_all(window(), ListFilters::default()).collect_all())
            .unwrap();

        let unique: HashSet<String> = keys(&records).into_iter().collect();
        prop_assert_eq!(records.len(), expected);
        prop_assert_eq!(unique.len(), expected);
        prop_assert_eq!(feed.requests().len(), sizes.len());
    }
}
