use crate::document::Document;
use crate::error::{Error, StoreError};
use crate::model::{Entity, Notification};
use crate::store::{Filter, Query};

use super::{ListState, LiveList, Writer};

/// The signed-in user's inbox.
pub struct NotificationList {
    list: LiveList<Notification>,
    writer: Writer,
    user_id: String,
}

impl NotificationList {
    pub(crate) fn open(writer: Writer, user_id: &str) -> Self {
        let query = Query::collection(Notification::COLLECTION)
            .filter(Filter::eq(Notification::USER_ID, user_id));
        let list = LiveList::open(writer.store(), query, writer.notices().clone());
        Self {
            list,
            writer,
            user_id: user_id.to_string(),
        }
    }

    pub fn list(&self) -> &LiveList<Notification> {
        &self.list
    }

    pub fn items(&self) -> Vec<Notification> {
        self.list.items()
    }

    pub async fn wait_until(
        &self,
        pred: impl FnMut(&ListState<Notification>) -> bool,
    ) -> Option<ListState<Notification>> {
        self.list.wait_until(pred).await
    }

    pub fn unread_count(&self) -> usize {
        self.list.items().iter().filter(|n| !n.read).count()
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), Error> {
        self.owned(id).await?;
        self.writer
            .update(Notification::COLLECTION, id, read_fields(), "notification")
            .await
    }

    /// Mark every shown notification read. Each is written separately; the
    /// first failure stops the pass. Returns how many were marked.
    pub async fn mark_all_read(&self) -> Result<usize, Error> {
        let mut marked = 0;
        for notification in self.list.items().into_iter().filter(|n| !n.read) {
            self.writer
                .update_quietly(
                    Notification::COLLECTION,
                    &notification.id,
                    read_fields(),
                    "notification",
                )
                .await?;
            marked += 1;
        }
        if marked > 0 {
            self.writer
                .notices()
                .success(format!("Marked {marked} notification(s) as read"));
        }
        Ok(marked)
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.owned(id).await?;
        self.writer
            .delete(Notification::COLLECTION, id, "notification")
            .await
    }

    async fn owned(&self, id: &str) -> Result<Notification, Error> {
        let notification: Notification = self.writer.fetch(id).await?;
        if notification.user_id != self.user_id {
            log::warn!(
                "{} tried to change notification {id} sent to {}",
                self.user_id,
                notification.user_id
            );
            let denied = StoreError::PermissionDenied(Notification::COLLECTION.to_string());
            return self.writer.refuse(Err(denied.into()));
        }
        Ok(notification)
    }
}

fn read_fields() -> Document {
    let mut fields = Document::new();
    fields.insert(Notification::READ.into(), true.into());
    fields
}
