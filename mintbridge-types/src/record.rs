//! Raw records fetched from the source platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of commerce entity being synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Order,
    Product,
}

impl EntityKind {
    /// Source fields holding the natural key, in lookup order.
    #[must_use]
    pub const fn key_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Order => &["orderNumber"],
            EntityKind::Product => &["sku", "itemCode"],
        }
    }

    /// Human-readable name of the natural key.
    #[must_use]
    pub const fn key_name(&self) -> &'static str {
        match self {
            EntityKind::Order => "order number",
            EntityKind::Product => "SKU",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Order => write!(f, "order"),
            EntityKind::Product => write!(f, "product"),
        }
    }
}

/// A decoded source entity.
///
/// Records are immutable once fetched; mapping produces a new payload and
/// never edits the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    kind: EntityKind,
    body: Value,
}

impl SourceRecord {
    /// Wraps a decoded JSON body.
    #[must_use]
    pub fn new(kind: EntityKind, body: Value) -> Self {
        Self { kind, body }
    }

    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the raw JSON body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns a top-level field of the body.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Extracts the natural key (order number / SKU).
    ///
    /// Blank strings count as missing; numeric keys are rendered as strings.
    #[must_use]
    pub fn natural_key(&self) -> Option<String> {
        self.kind
            .key_fields()
            .iter()
            .find_map(|field| self.body.get(*field).and_then(key_text))
    }
}

/// Renders a JSON string or number as trimmed text.
///
/// Returns `None` for blank strings and every other JSON type.
#[must_use]
pub fn key_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
