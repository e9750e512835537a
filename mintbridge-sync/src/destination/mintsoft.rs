//! Mintsoft orders and products.

use super::{Destination, DestinationEntry, ListingPage};
use crate::auth::destination_credentials;
use crate::config::DestinationConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{ApiClient, build_client, ensure_success, read_json, read_optional_json};
use crate::mapping::DestinationPayload;
use async_trait::async_trait;
use mintbridge_types::{DestinationId, EntityKind, key_text};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Response fields that may carry the destination identifier, in order.
const ID_FIELDS: [&str; 5] = ["ID", "Id", "id", "OrderId", "ProductId"];

/// Endpoint layout for one Mintsoft collection.
struct Endpoints {
    list: &'static str,
    key_field: &'static str,
    collection: &'static str,
    /// Orders are updated at `{collection}/{id}`; products take the id in
    /// the body instead.
    id_in_path: bool,
}

const ORDERS: Endpoints = Endpoints {
    list: "/api/Order/List",
    key_field: "OrderNumber",
    collection: "/api/Order",
    id_in_path: true,
};

const PRODUCTS: Endpoints = Endpoints {
    list: "/api/Product/List",
    key_field: "SKU",
    collection: "/api/Product",
    id_in_path: false,
};

/// A Mintsoft entity collection scoped to one client.
pub struct MintsoftDestination {
    api: ApiClient,
    kind: EntityKind,
    endpoints: &'static Endpoints,
    client_id: i64,
    page_size: u32,
    max_pages: u32,
}

impl MintsoftDestination {
    pub fn orders(api: ApiClient, config: &DestinationConfig) -> Self {
        Self::with_kind(api, EntityKind::Order, config)
    }

    pub fn products(api: ApiClient, config: &DestinationConfig) -> Self {
        Self::with_kind(api, EntityKind::Product, config)
    }

    /// Builds the destination for `kind` with its own session-key provider.
    pub fn from_config(kind: EntityKind, config: &DestinationConfig) -> SyncResult<Self> {
        let client = build_client(config.timeout())?;
        let credentials = destination_credentials(config, client.clone());
        let api = ApiClient::new(client, config.api_base_url.clone(), credentials);
        Ok(Self::with_kind(api, kind, config))
    }

    fn with_kind(api: ApiClient, kind: EntityKind, config: &DestinationConfig) -> Self {
        let endpoints = match kind {
            EntityKind::Order => &ORDERS,
            EntityKind::Product => &PRODUCTS,
        };
        Self {
            api,
            kind,
            endpoints,
            client_id: config.client_id,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

#[async_trait]
impl Destination for MintsoftDestination {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }

    async fn authenticate(&self) -> SyncResult<()> {
        self.api.authenticate().await
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn list_page(&self, page: u32) -> SyncResult<ListingPage> {
        let url = self.api.url(self.endpoints.list);
        let query = [
            ("ClientId", self.client_id.to_string()),
            ("PageNo", page.to_string()),
            ("Limit", self.page_size.to_string()),
        ];
        let response = self
            .api
            .send("destination listing", |client| client.get(&url).query(&query))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Listing page not found, treating as empty");
            return Ok(ListingPage::default());
        }
        let body: Value = read_json(ensure_success(response).await?, "destination listing").await?;

        let Value::Array(rows) = body else {
            return Ok(ListingPage::default());
        };

        let key_field = self.endpoints.key_field;
        let entries: Vec<DestinationEntry> = rows
            .iter()
            .filter_map(|row| {
                let natural_key = key_text(row.get(key_field)?)?;
                let id = extract_id(row)?;
                Some(DestinationEntry { natural_key, id })
            })
            .collect();

        if entries.len() < rows.len() {
            debug!(
                rows = rows.len(),
                usable = entries.len(),
                "Skipped listing rows without key or id"
            );
        }
        Ok(ListingPage {
            rows: rows.len(),
            entries,
        })
    }

    #[instrument(skip(self, payload), fields(kind = %self.kind, natural_key = payload.natural_key()))]
    async fn create(&self, payload: &DestinationPayload) -> SyncResult<DestinationId> {
        let url = self.api.url(self.endpoints.collection);
        let body = payload.to_value();
        let response = self
            .api
            .send("destination create", |client| client.put(&url).json(&body))
            .await?;
        let body = read_optional_json(ensure_success(response).await?, "destination create").await?;

        let id = extract_id(&body).ok_or_else(|| {
            SyncError::Transient(format!(
                "create of {} {} returned no identifier",
                self.kind,
                payload.natural_key()
            ))
        })?;
        info!(%id, "Created destination entity");
        Ok(id)
    }

    #[instrument(skip(self, payload), fields(kind = %self.kind, natural_key = payload.natural_key()))]
    async fn update(
        &self,
        id: &DestinationId,
        payload: &DestinationPayload,
    ) -> SyncResult<DestinationId> {
        let (url, body) = if self.endpoints.id_in_path {
            (
                self.api.url(&format!("{}/{}", self.endpoints.collection, id)),
                payload.to_value(),
            )
        } else {
            (
                self.api.url(self.endpoints.collection),
                payload.body_with("ID", id_value(id)),
            )
        };

        let response = self
            .api
            .send("destination update", |client| client.post(&url).json(&body))
            .await?;
        let body = read_optional_json(ensure_success(response).await?, "destination update").await?;

        let updated = extract_id(&body).unwrap_or_else(|| id.clone());
        info!(id = %updated, "Updated destination entity");
        Ok(updated)
    }
}

/// Reads the identifier from an object, or from the first element of an array.
pub fn extract_id(body: &Value) -> Option<DestinationId> {
    let object = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    ID_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(key_text))
        .map(DestinationId::new)
}

/// Mintsoft ids are numeric; keep them numeric on the wire when they are.
fn id_value(id: &DestinationId) -> Value {
    id.as_str()
        .parse::<i64>()
        .map_or_else(|_| Value::String(id.to_string()), Value::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_from_object_fields_in_order() {
        assert_eq!(extract_id(&json!({"ID": 7, "OrderId": 9})), Some(DestinationId::from(7)));
        assert_eq!(extract_id(&json!({"ProductId": "42"})), Some(DestinationId::new("42")));
    }

    #[test]
    fn id_from_first_array_element() {
        assert_eq!(extract_id(&json!([{"Id": 3}, {"Id": 4}])), Some(DestinationId::from(3)));
        assert_eq!(extract_id(&json!([])), None);
    }

    #[test]
    fn id_missing_or_blank() {
        assert_eq!(extract_id(&json!({"Success": true})), None);
        assert_eq!(extract_id(&json!({"ID": ""})), None);
        assert_eq!(extract_id(&Value::Null), None);
    }

    #[test]
    fn numeric_ids_stay_numeric() {
        assert_eq!(id_value(&DestinationId::from(12)), json!(12));
        assert_eq!(id_value(&DestinationId::new("abc")), json!("abc"));
    }
}
