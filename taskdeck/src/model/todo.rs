use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Entity, Priority, fields};
use crate::document::{self, Document};

/// A private todo owned by exactly one user.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalTodo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub user_id: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonalTodo {
    pub(crate) const USER_ID: &'static str = "userId";
    pub(crate) const COMPLETED: &'static str = "completed";
}

impl Entity for PersonalTodo {
    const COLLECTION: &'static str = "personalTodos";

    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self {
        PersonalTodo {
            id: id.to_string(),
            title: document::string_field(doc, "title"),
            description: document::opt_string_field(doc, "description"),
            user_id: document::string_field(doc, Self::USER_ID),
            completed: document::bool_field(doc, Self::COMPLETED),
            priority: document::enum_field(doc, "priority"),
            due_date: document::timestamp_field(doc, "dueDate"),
            created_at: document::timestamp_field(doc, fields::CREATED_AT).unwrap_or(now),
            updated_at: document::timestamp_field(doc, fields::UPDATED_AT).unwrap_or(now),
        }
    }

    /// Incomplete before completed, newest first within each group.
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| {
            a.completed
                .cmp(&b.completed)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
    }
}

/// Fields a user supplies when adding a todo.
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to [`Priority::Medium`].
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTodo {
    pub fn titled(title: impl Into<String>) -> Self {
        NewTodo {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub(crate) fn into_document(self, user_id: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("title".into(), self.title.trim().into());
        if let Some(description) = self.description.filter(|d| !d.trim().is_empty()) {
            doc.insert("description".into(), description.into());
        }
        doc.insert(PersonalTodo::USER_ID.into(), user_id.into());
        doc.insert(PersonalTodo::COMPLETED.into(), false.into());
        doc.insert(
            "priority".into(),
            document::enum_value(&self.priority.unwrap_or_default()),
        );
        if let Some(due) = self.due_date {
            doc.insert("dueDate".into(), document::timestamp_value(due));
        }
        doc
    }
}

/// Partial edit of a todo. Ownership and creation time are not editable.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TodoPatch {
    pub(crate) fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub(crate) fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(title) = self.title {
            doc.insert("title".into(), title.trim().into());
        }
        if let Some(description) = self.description {
            doc.insert(
                "description".into(),
                description.map(Value::from).unwrap_or(Value::Null),
            );
        }
        if let Some(priority) = self.priority {
            doc.insert("priority".into(), document::enum_value(&priority));
        }
        if let Some(due) = self.due_date {
            doc.insert("dueDate".into(), document::opt_timestamp_value(due));
        }
        doc
    }
}
