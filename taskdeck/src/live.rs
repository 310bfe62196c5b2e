//! Live query subscriptions.
//!
//! A subscription delivers the full result of a [`Query`] once on start and
//! again after every change notification for the queried collection. Each
//! delivery is a complete snapshot; observers replace their state with it
//! rather than patching.
//!
//! The observer is registered by [`subscribe`] and released when the
//! returned [`Subscription`] is dropped or [`Subscription::unsubscribe`] is
//! called.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::document::StoredDocument;
use crate::error::StoreError;
use crate::store::{DocumentStore, Query};

/// Point-in-time result set of a live query, in store order.
pub type Snapshot = Vec<StoredDocument>;

/// Handle to an active live query. Dropping it stops delivery.
#[must_use = "dropping a Subscription immediately stops delivery"]
pub struct Subscription {
    collection: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    /// Whether snapshots may still be delivered. `false` once the query has
    /// failed or the store has shut down.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        log::debug!("Closed live query on {}", self.collection);
    }
}

/// Start a live query.
///
/// `observer` receives `Ok(snapshot)` for the initial result and after each
/// relevant change. If a query fails it receives the error once and the
/// subscription ends; it is not re-established.
///
/// Must be called from within a tokio runtime.
pub fn subscribe<F>(store: Arc<dyn DocumentStore>, query: Query, mut observer: F) -> Subscription
where
    F: FnMut(Result<Snapshot, StoreError>) + Send + 'static,
{
    // Register before the initial query so no write can fall between them.
    let mut changes = store.changes();
    let collection = query.collection.clone();
    log::debug!("Opened live query on {collection}");

    let handle = tokio::spawn(async move {
        if !deliver(store.as_ref(), &query, &mut observer).await {
            return;
        }
        loop {
            match changes.recv().await {
                Ok(change) if change.collection != query.collection => continue,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!(
                        "Live query on {} skipped {skipped} notifications, refreshing",
                        query.collection
                    );
                }
                Err(RecvError::Closed) => return,
            }
            if !deliver(store.as_ref(), &query, &mut observer).await {
                return;
            }
        }
    });

    Subscription { collection, handle }
}

async fn deliver<F>(store: &dyn DocumentStore, query: &Query, observer: &mut F) -> bool
where
    F: FnMut(Result<Snapshot, StoreError>),
{
    match store.query(query).await {
        Ok(snapshot) => {
            observer(Ok(snapshot));
            true
        }
        Err(e) => {
            log::warn!("Live query on {} failed: {e}", query.collection);
            observer(Err(e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::store::{ChangeNotification, Filter, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, mpsc};
    use tokio::time::timeout;

    type Events = mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>;

    fn open(store: &Arc<MemoryStore>, query: Query) -> (Subscription, Events) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = subscribe(store.clone(), query, move |event| {
            let _ = tx.send(event);
        });
        (sub, rx)
    }

    async fn next(rx: &mut Events) -> Result<Snapshot, StoreError> {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for snapshot")
            .expect("Subscription closed")
    }

    fn owned_by(owner: &str) -> Document {
        json!({ "userId": owner }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn initial_and_followup_snapshots() {
        let store = Arc::new(MemoryStore::new());
        store.create("todos", owned_by("u1")).await.unwrap();

        let (_sub, mut rx) = open(
            &store,
            Query::collection("todos").filter(Filter::eq("userId", "u1")),
        );
        assert_eq!(next(&mut rx).await.unwrap().len(), 1);

        store.create("todos", owned_by("u1")).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap().len(), 2);

        store.create("todos", owned_by("u2")).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_collections_do_not_trigger_snapshots() {
        let store = Arc::new(MemoryStore::new());
        let (_sub, mut rx) = open(&store, Query::collection("todos"));
        assert!(next(&mut rx).await.unwrap().is_empty());

        store.create("projects", Document::new()).await.unwrap();
        store.create("todos", Document::new()).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap().len(), 1);
    }

    /// Delegates to a memory store but can be told to fail every query.
    struct FlakyStore {
        inner: MemoryStore,
        fail_queries: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn create(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
            self.inner.create(collection, fields).await
        }

        async fn set(
            &self,
            collection: &str,
            id: &str,
            fields: Document,
        ) -> Result<(), StoreError> {
            self.inner.set(collection, id, fields).await
        }

        async fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<StoredDocument>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn query(&self, query: &Query) -> Result<Snapshot, StoreError> {
            if self.fail_queries.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable);
            }
            self.inner.query(query).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: Document,
        ) -> Result<(), StoreError> {
            self.inner.update(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, id).await
        }

        fn changes(&self) -> broadcast::Receiver<ChangeNotification> {
            self.inner.changes()
        }
    }

    #[tokio::test]
    async fn failed_query_ends_subscription() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_queries: AtomicBool::new(false),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = subscribe(store.clone(), Query::collection("todos"), move |event| {
            let _ = tx.send(event);
        });
        assert!(next(&mut rx).await.is_ok());

        store.fail_queries.store(true, Ordering::SeqCst);
        store.create("todos", Document::new()).await.unwrap();
        assert!(matches!(next(&mut rx).await, Err(StoreError::Unavailable)));

        // Not re-established, even once queries succeed again.
        store.fail_queries.store(false, Ordering::SeqCst);
        store.create("todos", Document::new()).await.unwrap();
        assert!(timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_none());

        timeout(Duration::from_secs(2), async {
            while sub.is_active() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Subscription should have finished");
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_observer() {
        let store = Arc::new(MemoryStore::new());
        let (sub, mut rx) = open(&store, Query::collection("todos"));
        assert!(next(&mut rx).await.is_ok());

        drop(sub);
        store.create("todos", Document::new()).await.unwrap();
        assert!(timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_none());
    }
}
