//! DSCO v3 feeds: orders (cursor-paginated) and catalog items (numbered pages).

use super::{DateField, ListFilters, Page, PageToken, PaginationStyle, SourceFeed};
use crate::auth::source_credentials;
use crate::config::SourceConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{ApiClient, build_client, ensure_success, read_json, read_optional_json};
use async_trait::async_trait;
use mintbridge_types::{EntityKind, PageCursor, SourceRecord, TimeWindow};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

/// Response of `POST /order/page`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderPageResponse {
    #[serde(default)]
    orders: Vec<Value>,
    scroll_id: Option<String>,
}

/// Orders created or updated within a window, scrolled by cursor.
pub struct DscoOrderFeed {
    api: ApiClient,
    page_size: u32,
    max_pages: u32,
}

impl DscoOrderFeed {
    pub fn new(api: ApiClient, page_size: u32, max_pages: u32) -> Self {
        Self {
            api,
            page_size,
            max_pages,
        }
    }

    /// Builds the feed, its HTTP client and its credential provider.
    pub fn from_config(config: &SourceConfig) -> SyncResult<Self> {
        let client = build_client(config.timeout())?;
        let credentials = source_credentials(config, client.clone());
        let api = ApiClient::new(client, config.api_base_url.clone(), credentials);
        Ok(Self::new(api, config.page_size, config.max_pages))
    }

    fn first_page_body(&self, window: &TimeWindow, filters: &ListFilters) -> Value {
        let mut body = Map::new();
        body.insert("limit".into(), json!(self.page_size));

        match filters.date_field {
            DateField::Created => {
                body.insert("ordersCreatedSince".into(), json!(window.since_param()));
                body.insert("until".into(), json!(window.until_param()));
            }
            DateField::Updated => {
                body.insert("ordersUpdatedSince".into(), json!(window.since_param()));
                body.insert("until".into(), json!(window.until_param()));
            }
            DateField::RetailerCreated => {
                body.insert(
                    "retailerCreateDate".into(),
                    json!({ "from": window.since_param(), "to": window.until_param() }),
                );
            }
        }

        if let Some(status) = &filters.status {
            body.insert("status".into(), json!(status));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl SourceFeed for DscoOrderFeed {
    fn kind(&self) -> EntityKind {
        EntityKind::Order
    }

    fn pagination(&self) -> PaginationStyle {
        PaginationStyle::Cursor
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }

    async fn authenticate(&self) -> SyncResult<()> {
        self.api.authenticate().await
    }

    #[instrument(skip(self, window, filters, token), fields(token = %token))]
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        filters: &ListFilters,
        token: &PageToken,
    ) -> SyncResult<Page> {
        let cursor = match token {
            PageToken::Cursor(cursor) => cursor,
            PageToken::Number(_) => {
                return Err(SyncError::Config(
                    "order feed paginates by cursor, not page number".to_string(),
                ));
            }
        };

        let body = match cursor.token() {
            Some(scroll_id) => json!({ "scrollId": scroll_id }),
            None => self.first_page_body(window, filters),
        };
        debug!(%body, "Requesting order page");

        let url = self.api.url("/order/page");
        let response = self
            .api
            .send("order page", |client| client.post(&url).json(&body))
            .await?;
        let page: OrderPageResponse = read_json(ensure_success(response).await?, "order page").await?;

        Ok(Page {
            records: to_records(EntityKind::Order, page.orders),
            next_cursor: PageCursor::from_option(page.scroll_id),
            total_pages: None,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_one(&self, natural_key: &str) -> SyncResult<Option<SourceRecord>> {
        let url = self.api.url("/order/");
        let response = self
            .api
            .send("order lookup", |client| {
                client
                    .get(&url)
                    .query(&[("orderKey", "poNumber"), ("value", natural_key)])
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_optional_json(ensure_success(response).await?, "order lookup").await?;

        // The endpoint answers with a bare order, an array, or `{orders: [...]}`.
        let order = match body {
            Value::Array(items) => items.into_iter().next(),
            Value::Object(mut map) => match map.remove("orders") {
                Some(Value::Array(items)) => items.into_iter().next(),
                Some(other) => {
                    map.insert("orders".into(), other);
                    Some(Value::Object(map))
                }
                None => Some(Value::Object(map)),
            },
            _ => None,
        };

        Ok(order
            .filter(|value| value.is_object())
            .map(|value| SourceRecord::new(EntityKind::Order, value)))
    }
}

/// Catalog items created or updated within a window, by 0-based page number.
pub struct DscoItemFeed {
    api: ApiClient,
    page_size: u32,
    max_pages: u32,
}

impl DscoItemFeed {
    pub fn new(api: ApiClient, page_size: u32, max_pages: u32) -> Self {
        Self {
            api,
            page_size,
            max_pages,
        }
    }

    pub fn from_config(config: &SourceConfig) -> SyncResult<Self> {
        let client = build_client(config.timeout())?;
        let credentials = source_credentials(config, client.clone());
        let api = ApiClient::new(client, config.api_base_url.clone(), credentials);
        Ok(Self::new(api, config.page_size, config.max_pages))
    }

    fn page_query(
        &self,
        window: &TimeWindow,
        filters: &ListFilters,
        page: u32,
    ) -> SyncResult<Vec<(&'static str, String)>> {
        let (min, max) = match filters.date_field {
            DateField::Created => ("createdAtMin", "createdAtMax"),
            DateField::Updated => ("updatedAtMin", "updatedAtMax"),
            DateField::RetailerCreated => {
                return Err(SyncError::Config(
                    "item feed cannot filter on retailer-created".to_string(),
                ));
            }
        };

        let mut query = vec![
            ("page", page.to_string()),
            ("size", self.page_size.to_string()),
            (min, window.since_param()),
            (max, window.until_param()),
        ];
        if let Some(status) = &filters.status {
            query.push(("status", status.clone()));
        }
        Ok(query)
    }
}

#[async_trait]
impl SourceFeed for DscoItemFeed {
    fn kind(&self) -> EntityKind {
        EntityKind::Product
    }

    fn pagination(&self) -> PaginationStyle {
        PaginationStyle::Numbered { first_page: 0 }
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }

    async fn authenticate(&self) -> SyncResult<()> {
        self.api.authenticate().await
    }

    #[instrument(skip(self, window, filters, token), fields(token = %token))]
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        filters: &ListFilters,
        token: &PageToken,
    ) -> SyncResult<Page> {
        let page = match token {
            PageToken::Number(n) => *n,
            PageToken::Cursor(_) => {
                return Err(SyncError::Config(
                    "item feed paginates by page number, not cursor".to_string(),
                ));
            }
        };

        let query = self.page_query(window, filters, page)?;
        let url = self.api.url("/item/page");
        let response = self
            .api
            .send("item page", |client| client.get(&url).query(&query))
            .await?;
        let body: Value = read_json(ensure_success(response).await?, "item page").await?;

        let items = ["content", "items", "products"]
            .iter()
            .filter_map(|field| body.get(*field).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .cloned()
            .unwrap_or_default();

        let total_pages = body
            .get("totalPages")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        Ok(Page {
            records: to_records(EntityKind::Product, items),
            next_cursor: PageCursor::start(),
            total_pages,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_one(&self, natural_key: &str) -> SyncResult<Option<SourceRecord>> {
        let url = self.api.url("/catalog");
        let response = self
            .api
            .send("catalog lookup", |client| {
                client.get(&url).query(&[("itemCode", natural_key)])
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_optional_json(ensure_success(response).await?, "catalog lookup").await?;

        let item = match body {
            Value::Array(items) => items.into_iter().next(),
            other => Some(other),
        };
        Ok(item
            .filter(|value| value.is_object())
            .map(|value| SourceRecord::new(EntityKind::Product, value)))
    }
}

fn to_records(kind: EntityKind, values: Vec<Value>) -> Vec<SourceRecord> {
    values
        .into_iter()
        .map(|value| SourceRecord::new(kind, value))
        .collect()
}
