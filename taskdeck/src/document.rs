//! Raw stored documents and the field readers the entity mappers use.
//!
//! Readers never fail: a missing or ill-typed field falls back to the
//! type-appropriate empty value (`""`, `false`, `None`, empty list, enum
//! default).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Field map of a stored document.
pub type Document = serde_json::Map<String, Value>;

/// A document together with its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, fields: Document) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

pub fn string_field(doc: &Document, key: &str) -> String {
    opt_string_field(doc, key).unwrap_or_default()
}

pub fn opt_string_field(doc: &Document, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_owned)
}

pub fn bool_field(doc: &Document, key: &str) -> bool {
    doc.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// String elements of an array field; non-string elements are skipped.
pub fn string_list_field(doc: &Document, key: &str) -> Vec<String> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Decode an enumeration stored as its string form.
pub fn enum_field<E>(doc: &Document, key: &str) -> E
where
    E: DeserializeOwned + Default,
{
    doc.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Decode a stored timestamp (`{"seconds": i64, "nanoseconds": u32}`).
///
/// Returns `None` unless both parts are integers, nanoseconds are below one
/// second, and the instant is representable.
pub fn timestamp_field(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    let ts = doc.get(key)?.as_object()?;
    let seconds = ts.get("seconds")?.as_i64()?;
    let nanos = ts.get("nanoseconds")?.as_u64()?;
    if nanos >= 1_000_000_000 {
        return None;
    }
    DateTime::from_timestamp(seconds, nanos as u32)
}

/// Encode a timestamp in the stored shape.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({
        "seconds": at.timestamp(),
        "nanoseconds": at.timestamp_subsec_nanos(),
    })
}

pub fn opt_timestamp_value(at: Option<DateTime<Utc>>) -> Value {
    at.map(timestamp_value).unwrap_or(Value::Null)
}

/// Serialize an enumeration to its stored string form.
pub fn enum_value<E: serde::Serialize>(value: &E) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
