//! Typed entities and their view-model mappers.
//!
//! Each entity knows its collection, how to build itself from a raw stored
//! document, and the fixed order its live list is shown in.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;

mod notification;
mod project;
mod task;
mod todo;
mod user;

pub use notification::{NewNotification, Notification};
pub use project::{NewProject, Project, ProjectPatch};
pub use task::{NewTask, Task, TaskPatch};
pub use todo::{NewTodo, PersonalTodo, TodoPatch};
pub use user::User;

/// Stored field names shared by several entities.
pub(crate) mod fields {
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// A record type backed by one document collection.
pub trait Entity: Sized + Clone + Send + Sync + 'static {
    /// Collection the entity is stored in.
    const COLLECTION: &'static str;

    /// Build the record from a raw document. `now` stands in for missing or
    /// malformed `createdAt`/`updatedAt` values.
    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self;

    /// Put a freshly mapped snapshot into display order.
    fn sort(items: &mut [Self]);
}

/// Newest first; shared by every list without a more specific order.
pub(crate) fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskCompleted,
    ProjectUpdate,
    DeadlineReminder,
    #[default]
    General,
}
