//! List synchronization controllers.
//!
//! A [`LiveList`] keeps a sorted, typed copy of a live query's latest
//! snapshot. The per-entity controllers ([`TodoList`], [`ProjectList`],
//! [`TaskList`], [`NotificationList`]) pair one with the write operations
//! for that entity; writes go straight to the store and the list catches up
//! through the next snapshot.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::clock::MonotonicClock;
use crate::document::{Document, timestamp_value};
use crate::error::{Error, StoreError, ValidationError};
use crate::live::{self, Subscription};
use crate::model::{Entity, NewNotification, Notification, fields};
use crate::notice::Notices;
use crate::store::{DocumentStore, Query};

mod notifications;
mod projects;
mod tasks;
mod todos;

pub use notifications::NotificationList;
pub use projects::{ProjectList, ProjectScope};
pub use tasks::{TaskList, TaskScope, TaskStats};
pub use todos::TodoList;

/// What a [`LiveList`] currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    /// No snapshot has arrived yet.
    pub loading: bool,
    /// Why the subscription stopped, if it did.
    pub error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// Sorted typed view of a live query.
///
/// Every snapshot replaces the whole list. If the subscription fails the
/// last list is kept, `loading` is cleared and the failure is announced
/// once. Dropping the list closes the subscription.
pub struct LiveList<T> {
    state: watch::Receiver<ListState<T>>,
    subscription: Subscription,
}

impl<T: Entity> LiveList<T> {
    /// Open a live list over `query`. Must be called from within a tokio
    /// runtime.
    pub fn open(store: Arc<dyn DocumentStore>, query: Query, notices: Notices) -> Self {
        let (tx, state) = watch::channel(ListState::default());
        let subscription = live::subscribe(store, query, move |event| match event {
            Ok(snapshot) => {
                let now = Utc::now();
                let mut items: Vec<T> = snapshot
                    .iter()
                    .map(|doc| T::from_document(&doc.id, &doc.fields, now))
                    .collect();
                T::sort(&mut items);
                tx.send_modify(|s| {
                    s.items = items;
                    s.loading = false;
                    s.error = None;
                });
            }
            Err(e) => {
                notices.error(format!("Failed to load {}: {e}", T::COLLECTION));
                tx.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
            }
        });
        Self {
            state,
            subscription,
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn state(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Whether snapshots are still arriving.
    pub fn is_live(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn watch(&self) -> watch::Receiver<ListState<T>> {
        self.state.clone()
    }

    /// Wait until the list satisfies `pred` and return it.
    pub async fn wait_until(
        &self,
        mut pred: impl FnMut(&ListState<T>) -> bool,
    ) -> Option<ListState<T>> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|s| pred(s)).await.ok()?;
        Some(state.clone())
    }
}

/// Notifications only carry `createdAt`.
fn tracks_updates(collection: &str) -> bool {
    collection != Notification::COLLECTION
}

/// Shared write path: stamps timestamps, performs the write, announces the
/// outcome.
#[derive(Clone)]
pub(crate) struct Writer {
    store: Arc<dyn DocumentStore>,
    notices: Notices,
    clock: Arc<MonotonicClock>,
}

impl Writer {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        notices: Notices,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            store,
            notices,
            clock,
        }
    }

    pub(crate) fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub(crate) fn notices(&self) -> &Notices {
        &self.notices
    }

    pub(crate) fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Announce a rejected form and turn it into an [`Error`].
    pub(crate) fn check(&self, result: Result<(), ValidationError>) -> Result<(), Error> {
        result.map_err(|e| {
            self.notices.error(e.to_string());
            Error::from(e)
        })
    }

    /// Announce a refused action and pass the error on.
    pub(crate) fn refuse<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        result.inspect_err(|e| self.notices.error(e.to_string()))
    }

    /// Load one entity, failing with [`StoreError::NotFound`] if it is gone.
    pub(crate) async fn fetch<T: Entity>(&self, id: &str) -> Result<T, Error> {
        let loaded = match self.store.get(T::COLLECTION, id).await {
            Ok(Some(doc)) => Ok(T::from_document(&doc.id, &doc.fields, Utc::now())),
            Ok(None) => Err(StoreError::NotFound {
                collection: T::COLLECTION.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e),
        };
        loaded.map_err(|e| {
            self.notices.error(format!("Failed to load {id}: {e}"));
            Error::from(e)
        })
    }

    async fn insert(&self, collection: &str, mut fields: Document) -> Result<String, StoreError> {
        let now = timestamp_value(self.clock.now());
        if tracks_updates(collection) {
            fields.insert(fields::UPDATED_AT.into(), now.clone());
        }
        fields.insert(fields::CREATED_AT.into(), now);
        self.store.create(collection, fields).await
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        mut fields: Document,
    ) -> Result<(), StoreError> {
        fields.remove(fields::CREATED_AT);
        if tracks_updates(collection) {
            fields.insert(
                fields::UPDATED_AT.into(),
                timestamp_value(self.clock.now()),
            );
        }
        self.store.update(collection, id, fields).await
    }

    /// Create a document stamped with `createdAt`/`updatedAt`.
    pub(crate) async fn create(
        &self,
        collection: &str,
        fields: Document,
        label: &str,
    ) -> Result<String, Error> {
        match self.insert(collection, fields).await {
            Ok(id) => {
                self.notices.success(format!("Created {label}"));
                Ok(id)
            }
            Err(e) => {
                self.notices.error(format!("Failed to create {label}: {e}"));
                Err(e.into())
            }
        }
    }

    /// Write the changed fields plus a fresh `updatedAt`.
    pub(crate) async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        label: &str,
    ) -> Result<(), Error> {
        match self.patch(collection, id, fields).await {
            Ok(()) => {
                self.notices.success(format!("Updated {label}"));
                Ok(())
            }
            Err(e) => {
                self.notices.error(format!("Failed to update {label}: {e}"));
                Err(e.into())
            }
        }
    }

    /// Like [`update`](Self::update) but only failures are announced.
    pub(crate) async fn update_quietly(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        label: &str,
    ) -> Result<(), Error> {
        self.patch(collection, id, fields).await.map_err(|e| {
            self.notices.error(format!("Failed to update {label}: {e}"));
            Error::from(e)
        })
    }

    pub(crate) async fn delete(
        &self,
        collection: &str,
        id: &str,
        label: &str,
    ) -> Result<(), Error> {
        match self.store.delete(collection, id).await {
            Ok(()) => {
                self.notices.success(format!("Deleted {label}"));
                Ok(())
            }
            Err(e) => {
                self.notices.error(format!("Failed to delete {label}: {e}"));
                Err(e.into())
            }
        }
    }

    /// Deliver a notification as a side effect of another write. Only a
    /// failure is announced; the triggering write is not undone.
    pub(crate) async fn notify(&self, notification: NewNotification) -> Result<String, Error> {
        let recipient = notification.user_id.clone();
        match self
            .insert(Notification::COLLECTION, notification.into_document())
            .await
        {
            Ok(id) => {
                log::info!("Notified {recipient} ({id})");
                Ok(id)
            }
            Err(e) => {
                self.notices
                    .error(format!("Failed to notify {recipient}: {e}"));
                Err(e.into())
            }
        }
    }
}
