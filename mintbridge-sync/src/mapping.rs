//! DSCO → Mintsoft field mapping.
//!
//! Mappers are pure: they read a [`SourceRecord`] and build a fresh
//! [`DestinationPayload`], failing with `SyncError::Validation` when a
//! mandatory field is missing. Null, empty-string and empty-collection
//! values never reach the payload.

use crate::config::MappingConfig;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use mintbridge_types::{EntityKind, SourceRecord, key_text};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// A mapped body ready to send to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationPayload {
    natural_key: String,
    body: Map<String, Value>,
}

impl DestinationPayload {
    /// Wraps a body, dropping empty values.
    pub fn new(natural_key: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            natural_key: natural_key.into(),
            body: remove_empty(body),
        }
    }

    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Returns a copy of the body with one extra field set.
    pub fn body_with(&self, field: &str, value: Value) -> Value {
        let mut body = self.body.clone();
        body.insert(field.to_string(), value);
        Value::Object(body)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// Transforms a source record into a destination payload.
pub trait RecordMapper: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn map(&self, record: &SourceRecord) -> SyncResult<DestinationPayload>;
}

/// Returns the mapper for `kind`.
pub fn mapper_for(kind: EntityKind, config: &MappingConfig) -> Arc<dyn RecordMapper> {
    match kind {
        EntityKind::Order => Arc::new(OrderMapper::new(config.clone())),
        EntityKind::Product => Arc::new(ProductMapper::new(config.clone())),
    }
}

/// DSCO order → Mintsoft order.
pub struct OrderMapper {
    config: MappingConfig,
}

impl OrderMapper {
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }

    fn courier_service_id(&self, shipping_method: Option<&Value>) -> i64 {
        shipping_method
            .and_then(Value::as_str)
            .and_then(|name| self.config.courier_services.get(name.trim()))
            .copied()
            .unwrap_or(self.config.default_courier_service_id)
    }

    fn order_items(&self, lines: Option<&Value>) -> Vec<Value> {
        let Some(lines) = lines.and_then(Value::as_array) else {
            return Vec::new();
        };

        lines
            .iter()
            .filter_map(|line| {
                let sku = text(line.get("sku"))?;
                let quantity = integer(line.get("quantity")).filter(|q| *q > 0)?;

                let mut item = Map::new();
                item.insert("SKU".into(), json!(sku));
                item.insert("Quantity".into(), json!(quantity));
                item.insert("WarehouseId".into(), json!(self.config.warehouse_id));
                if let Some(price) = number(line.get("unitPrice")) {
                    item.insert("UnitPrice".into(), json!(price));
                }
                Some(Value::Object(item))
            })
            .collect()
    }
}

impl RecordMapper for OrderMapper {
    fn kind(&self) -> EntityKind {
        EntityKind::Order
    }

    fn map(&self, record: &SourceRecord) -> SyncResult<DestinationPayload> {
        ensure_kind(record, EntityKind::Order)?;
        let order_number = record
            .natural_key()
            .ok_or_else(|| SyncError::Validation("order is missing orderNumber".to_string()))?;

        let empty = Value::Null;
        let customer = record.field("customer").unwrap_or(&empty);
        let shipping = record.field("shippingAddress").unwrap_or(&empty);
        let (first_name, last_name) = split_name(customer.get("name"));

        let mut body = Map::new();
        body.insert("OrderNumber".into(), json!(order_number));
        body.insert(
            "ExternalOrderReference".into(),
            json!(text(record.field("externalOrderReference")).unwrap_or_else(|| order_number.clone())),
        );

        body.insert("FirstName".into(), json!(first_name));
        body.insert("LastName".into(), json!(last_name));
        body.insert("CompanyName".into(), json!(text(customer.get("company"))));
        body.insert("Email".into(), json!(text(customer.get("email"))));
        body.insert("Phone".into(), json!(text(customer.get("phone"))));

        body.insert("Address1".into(), json!(text(shipping.get("address1"))));
        body.insert("Address2".into(), json!(text(shipping.get("address2"))));
        body.insert("Town".into(), json!(text(shipping.get("city"))));
        body.insert("County".into(), json!(text(shipping.get("state"))));
        body.insert("PostCode".into(), json!(text(shipping.get("postcode"))));
        body.insert("Country".into(), json!(country(shipping.get("country"))));

        body.insert("WarehouseId".into(), json!(self.config.warehouse_id));
        body.insert("ClientId".into(), json!(self.config.client_id));
        body.insert(
            "CourierServiceId".into(),
            json!(self.courier_service_id(record.field("shippingMethod"))),
        );

        body.insert(
            "RequiredDespatchDate".into(),
            json!(local_date_time(record.field("shipByDate"))),
        );
        body.insert(
            "RequiredDeliveryDate".into(),
            json!(local_date_time(record.field("deliverByDate"))),
        );

        body.insert(
            "OrderItems".into(),
            Value::Array(self.order_items(record.field("orderLines"))),
        );
        body.insert("Comments".into(), json!(text(record.field("notes"))));
        body.insert("Channel".into(), json!("DSCO"));

        Ok(DestinationPayload::new(order_number, body))
    }
}

/// DSCO catalog item → Mintsoft product.
pub struct ProductMapper {
    config: MappingConfig,
}

impl ProductMapper {
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }
}

impl RecordMapper for ProductMapper {
    fn kind(&self) -> EntityKind {
        EntityKind::Product
    }

    fn map(&self, record: &SourceRecord) -> SyncResult<DestinationPayload> {
        ensure_kind(record, EntityKind::Product)?;
        let sku = record
            .natural_key()
            .ok_or_else(|| SyncError::Validation("product is missing SKU".to_string()))?;

        let name = text(record.field("name"))
            .or_else(|| text(record.field("description")))
            .unwrap_or_else(|| sku.clone());

        let mut body = Map::new();
        body.insert("SKU".into(), json!(sku));
        body.insert("Name".into(), json!(name));
        body.insert("Barcode".into(), json!(text(record.field("barcode"))));
        body.insert("ClientId".into(), json!(self.config.client_id));
        body.insert("WarehouseId".into(), json!(self.config.warehouse_id));
        body.insert(
            "RetailPrice".into(),
            json!(number(record.field("price")).unwrap_or(0.0)),
        );
        body.insert("Weight".into(), json!(number(record.field("weight"))));
        body.insert("IsActive".into(), json!(true));
        body.insert("IsStockItem".into(), json!(true));
        body.insert("IsSerialized".into(), json!(false));
        body.insert("IsBatchTracked".into(), json!(false));

        // Partial dimensions are worse than none.
        if let Some(dims) = record.field("dimensions") {
            let length = number(dims.get("length"));
            let width = number(dims.get("width"));
            let height = number(dims.get("height"));
            if let (Some(length), Some(width), Some(height)) = (length, width, height) {
                body.insert("Length".into(), json!(length));
                body.insert("Width".into(), json!(width));
                body.insert("Height".into(), json!(height));
            }
        }

        Ok(DestinationPayload::new(sku, body))
    }
}

fn ensure_kind(record: &SourceRecord, expected: EntityKind) -> SyncResult<()> {
    if record.kind() != expected {
        return Err(SyncError::Validation(format!(
            "expected a {expected} record, got a {}",
            record.kind()
        )));
    }
    Ok(())
}

/// Trimmed, non-empty text. Numbers are rendered as text.
fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(key_text)
}

/// A finite number, parsing numeric strings.
fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Splits on the first space: `"Ada King Lovelace"` → `("Ada", "King Lovelace")`.
fn split_name(value: Option<&Value>) -> (String, String) {
    let Some(name) = text(value) else {
        return (String::new(), String::new());
    };
    match name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name, String::new()),
    }
}

/// Two-letter codes are upper-cased; anything else passes through.
fn country(value: Option<&Value>) -> Option<String> {
    let country = text(value)?;
    if country.chars().count() == 2 {
        Some(country.to_uppercase())
    } else {
        Some(country)
    }
}

/// Normalizes a date or date-time to `YYYY-MM-DDTHH:MM:SS` without a zone.
///
/// Zoned inputs are converted to UTC first. Unparseable input yields `None`.
fn local_date_time(value: Option<&Value>) -> Option<String> {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    let raw = text(value)?;

    if let Ok(zoned) = DateTime::parse_from_rfc3339(&raw) {
        return Some(zoned.naive_utc().format(FORMAT).to_string());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.format(FORMAT).to_string());
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.format(FORMAT).to_string())
}

fn remove_empty(body: Map<String, Value>) -> Map<String, Value> {
    body.into_iter().filter(|(_, value)| !is_empty(value)).collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_keeps_rest_together() {
        let (first, last) = split_name(Some(&json!("Ada King Lovelace")));
        assert_eq!(first, "Ada");
        assert_eq!(last, "King Lovelace");
    }

    #[test]
    fn split_name_single_word() {
        assert_eq!(split_name(Some(&json!("Cher"))), ("Cher".to_string(), String::new()));
        assert_eq!(split_name(None), (String::new(), String::new()));
    }

    #[test]
    fn dates_drop_zone() {
        assert_eq!(
            local_date_time(Some(&json!("2024-01-05T10:30:00Z"))).as_deref(),
            Some("2024-01-05T10:30:00")
        );
        assert_eq!(
            local_date_time(Some(&json!("2024-01-05T12:30:00+02:00"))).as_deref(),
            Some("2024-01-05T10:30:00")
        );
        assert_eq!(
            local_date_time(Some(&json!("2024-01-05"))).as_deref(),
            Some("2024-01-05T00:00:00")
        );
        assert_eq!(local_date_time(Some(&json!("next tuesday"))), None);
    }

    #[test]
    fn numbers_parse_from_strings() {
        assert_eq!(number(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(number(Some(&json!(3))), Some(3.0));
        assert_eq!(number(Some(&json!("n/a"))), None);
        assert_eq!(integer(Some(&json!("4"))), Some(4));
    }

    #[test]
    fn country_codes_upper_cased() {
        assert_eq!(country(Some(&json!("gb"))).as_deref(), Some("GB"));
        assert_eq!(country(Some(&json!("United Kingdom"))).as_deref(), Some("United Kingdom"));
    }
}
