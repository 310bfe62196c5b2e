//! Document store boundary.
//!
//! A [`DocumentStore`] holds named collections of schema-less documents.
//! Every successful write is followed by a [`ChangeNotification`] on the
//! store's broadcast channel; [`crate::live`] turns those into fresh query
//! snapshots.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::document::{Document, StoredDocument};
use crate::error::StoreError;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Capacity of the change notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// Lightweight event emitted after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub collection: String,
    pub id: String,
    pub kind: WriteKind,
}

/// A predicate on one document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// The field equals the value.
    Eq(String, Value),
    /// The field is an array containing the value.
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::ArrayContains(field.into(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::ArrayContains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// All documents of one collection matching every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Query {
            collection: name.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document under a store-generated id and return the id.
    async fn create(&self, collection: &str, fields: Document) -> Result<String, StoreError>;

    /// Insert or replace a document under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Matching documents in store order (insertion order).
    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError>;

    /// Merge `fields` into an existing document. Fails with
    /// [`StoreError::NotFound`] when the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Document)
    -> Result<(), StoreError>;

    /// Remove a document. Fails with [`StoreError::NotFound`] when the
    /// document does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Subscribe to change notifications for every collection.
    fn changes(&self) -> broadcast::Receiver<ChangeNotification>;
}

/// Shallow merge: top-level keys in `patch` replace those in `target`.
pub(crate) fn merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}
