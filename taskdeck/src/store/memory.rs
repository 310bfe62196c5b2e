//! In-process document store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{CHANGE_CHANNEL_CAPACITY, ChangeNotification, DocumentStore, Query, WriteKind, merge};
use crate::document::{Document, StoredDocument};
use crate::error::StoreError;

/// Document store kept entirely in memory.
///
/// Collections keep insertion order. Failures can be injected with
/// [`set_offline`](MemoryStore::set_offline) and [`deny`](MemoryStore::deny),
/// and [`write_count`](MemoryStore::write_count) reports how many writes have
/// been accepted.
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
    change_tx: broadcast::Sender<ChangeNotification>,
    offline: AtomicBool,
    denied: RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            change_tx,
            offline: AtomicBool::new(false),
            denied: RwLock::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject every call on `collection` with [`StoreError::PermissionDenied`].
    pub fn deny(&self, collection: &str) {
        self.denied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_string());
    }

    pub fn allow(&self, collection: &str) {
        self.denied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection);
    }

    /// Number of writes accepted so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        if self
            .denied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(collection)
        {
            return Err(StoreError::PermissionDenied(collection.to_string()));
        }
        Ok(())
    }

    fn notify(&self, collection: &str, id: &str, kind: WriteKind) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let _ = self.change_tx.send(ChangeNotification {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
        });
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        self.check(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument::new(id.clone(), fields));
        self.notify(collection, &id, WriteKind::Insert);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.check(collection)?;
        let kind = {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let docs = collections.entry(collection.to_string()).or_default();
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => {
                    existing.fields = fields;
                    WriteKind::Update
                }
                None => {
                    docs.push(StoredDocument::new(id, fields));
                    WriteKind::Insert
                }
            }
        };
        self.notify(collection, id, kind);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.check(collection)?;
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        self.check(&query.collection)?;
        Ok(self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.matches(&d.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.check(collection)?;
        {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let existing = collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| Self::not_found(collection, id))?;
            merge(&mut existing.fields, fields);
        }
        self.notify(collection, id, WriteKind::Update);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check(collection)?;
        {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let docs = collections
                .get_mut(collection)
                .ok_or_else(|| Self::not_found(collection, id))?;
            let index = docs
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| Self::not_found(collection, id))?;
            docs.remove(index);
        }
        self.notify(collection, id, WriteKind::Delete);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn crud_round() {
        let store = MemoryStore::new();
        let id = store
            .create("tasks", doc(json!({ "title": "Buy milk", "done": false })))
            .await
            .unwrap();

        let found = store.get("tasks", &id).await.unwrap().unwrap();
        assert_eq!(found.fields.get("title"), Some(&json!("Buy milk")));

        store
            .update("tasks", &id, doc(json!({ "done": true })))
            .await
            .unwrap();
        let found = store.get("tasks", &id).await.unwrap().unwrap();
        assert_eq!(found.fields.get("title"), Some(&json!("Buy milk")));
        assert_eq!(found.fields.get("done"), Some(&json!(true)));

        store.delete("tasks", &id).await.unwrap();
        assert!(store.get("tasks", &id).await.unwrap().is_none());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn query_keeps_insertion_order() {
        let store = MemoryStore::new();
        for (title, owner) in [("a", "u1"), ("b", "u2"), ("c", "u1")] {
            store
                .create("todos", doc(json!({ "title": title, "userId": owner })))
                .await
                .unwrap();
        }
        let docs = store
            .query(&Query::collection("todos").filter(Filter::eq("userId", "u1")))
            .await
            .unwrap();
        let titles: Vec<_> = docs.iter().map(|d| d.fields["title"].clone()).collect();
        assert_eq!(titles, vec![json!("a"), json!("c")]);
    }

    #[tokio::test]
    async fn missing_documents_are_reported() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update("tasks", "nope", Document::new()).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("tasks", "nope").await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn writes_emit_change_notifications() {
        let store = MemoryStore::new();
        let mut rx = store.changes();
        store.set("users", "u1", doc(json!({ "name": "A" }))).await.unwrap();
        store.set("users", "u1", doc(json!({ "name": "B" }))).await.unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.collection, "users");
        assert_eq!(first.id, "u1");
        assert_eq!(first.kind, WriteKind::Insert);
        assert_eq!(rx.try_recv().unwrap().kind, WriteKind::Update);
        assert_eq!(store.len("users"), 1);
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryStore::new();
        store.deny("projects");
        assert!(matches!(
            store.create("projects", Document::new()).await,
            Err(StoreError::PermissionDenied(_))
        ));
        store.allow("projects");
        store.set_offline(true);
        assert!(matches!(
            store.query(&Query::collection("projects")).await,
            Err(StoreError::Unavailable)
        ));
        store.set_offline(false);
        assert!(store.create("projects", Document::new()).await.is_ok());
    }
}
