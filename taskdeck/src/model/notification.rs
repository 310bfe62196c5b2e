use chrono::{DateTime, Utc};

use super::{Entity, NotificationKind, fields, newest_first};
use crate::document::{self, Document};

/// A message delivered to a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) const USER_ID: &'static str = "userId";
    pub(crate) const READ: &'static str = "read";
}

impl Entity for Notification {
    const COLLECTION: &'static str = "notifications";

    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self {
        Notification {
            id: id.to_string(),
            user_id: document::string_field(doc, Self::USER_ID),
            kind: document::enum_field(doc, "type"),
            title: document::string_field(doc, "title"),
            message: document::string_field(doc, "message"),
            read: document::bool_field(doc, Self::READ),
            link: document::opt_string_field(doc, "link"),
            created_at: document::timestamp_field(doc, fields::CREATED_AT).unwrap_or(now),
        }
    }

    fn sort(items: &mut [Self]) {
        newest_first(items, |n| n.created_at);
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        NewNotification {
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub(crate) fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert(Notification::USER_ID.into(), self.user_id.into());
        doc.insert("type".into(), document::enum_value(&self.kind));
        doc.insert("title".into(), self.title.into());
        doc.insert("message".into(), self.message.into());
        doc.insert(Notification::READ.into(), false.into());
        if let Some(link) = self.link {
            doc.insert("link".into(), link.into());
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_is_read_from_type_field() {
        let doc = json!({ "userId": "u1", "type": "task-assigned", "title": "New task" });
        let n = Notification::from_document("n1", doc.as_object().unwrap(), Utc::now());
        assert_eq!(n.kind, NotificationKind::TaskAssigned);
        assert!(!n.read);
        assert!(n.link.is_none());
    }

    #[test]
    fn new_notification_is_unread() {
        let doc = NewNotification::new("u1", NotificationKind::General, "Hi", "Hello")
            .with_link("/tasks")
            .into_document();
        assert_eq!(doc.get("read"), Some(&json!(false)));
        assert_eq!(doc.get("type"), Some(&json!("general")));
        assert_eq!(doc.get("link"), Some(&json!("/tasks")));
    }
}
