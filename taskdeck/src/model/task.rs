use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Entity, Priority, TaskStatus, fields, newest_first};
use crate::document::{self, Document};

/// A unit of work inside one project, assigned to any number of users.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub assigned_to: Vec<String>,
    pub assigned_by: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub(crate) const PROJECT_ID: &'static str = "projectId";
    pub(crate) const ASSIGNED_TO: &'static str = "assignedTo";
    pub(crate) const STATUS: &'static str = "status";

    /// Not completed and past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < now)
    }
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self {
        Task {
            id: id.to_string(),
            title: document::string_field(doc, "title"),
            description: document::string_field(doc, "description"),
            project_id: document::string_field(doc, Self::PROJECT_ID),
            assigned_to: document::string_list_field(doc, Self::ASSIGNED_TO),
            assigned_by: document::string_field(doc, "assignedBy"),
            priority: document::enum_field(doc, "priority"),
            status: document::enum_field(doc, Self::STATUS),
            start_date: document::timestamp_field(doc, "startDate"),
            end_date: document::timestamp_field(doc, "endDate"),
            due_date: document::timestamp_field(doc, "dueDate"),
            created_at: document::timestamp_field(doc, fields::CREATED_AT).unwrap_or(now),
            updated_at: document::timestamp_field(doc, fields::UPDATED_AT).unwrap_or(now),
        }
    }

    fn sort(items: &mut [Self]) {
        newest_first(items, |t| t.created_at);
    }
}

/// Drop duplicate and blank ids, keeping first occurrences in order.
pub(crate) fn dedup_assignees(ids: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub assigned_to: Vec<String>,
    /// Defaults to [`Priority::Medium`].
    pub priority: Option<Priority>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub(crate) fn into_document(self, assigned_by: &str) -> Document {
        let assignees: Vec<Value> = dedup_assignees(self.assigned_to)
            .into_iter()
            .map(Value::from)
            .collect();
        let mut doc = Document::new();
        doc.insert("title".into(), self.title.trim().into());
        doc.insert("description".into(), self.description.trim().into());
        doc.insert(Task::PROJECT_ID.into(), self.project_id.trim().into());
        doc.insert(Task::ASSIGNED_TO.into(), Value::Array(assignees));
        doc.insert("assignedBy".into(), assigned_by.into());
        doc.insert(
            "priority".into(),
            document::enum_value(&self.priority.unwrap_or_default()),
        );
        doc.insert(Task::STATUS.into(), document::enum_value(&TaskStatus::Todo));
        for (key, value) in [
            ("startDate", self.start_date),
            ("endDate", self.end_date),
            ("dueDate", self.due_date),
        ] {
            if let Some(at) = value {
                doc.insert(key.into(), document::timestamp_value(at));
            }
        }
        doc
    }
}

/// Partial edit of a task. The project and assigner are fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub(crate) fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(title) = self.title {
            doc.insert("title".into(), title.trim().into());
        }
        if let Some(description) = self.description {
            doc.insert("description".into(), description.trim().into());
        }
        if let Some(assignees) = self.assigned_to {
            let assignees = dedup_assignees(assignees)
                .into_iter()
                .map(Value::from)
                .collect();
            doc.insert(Task::ASSIGNED_TO.into(), Value::Array(assignees));
        }
        if let Some(priority) = self.priority {
            doc.insert("priority".into(), document::enum_value(&priority));
        }
        if let Some(status) = self.status {
            doc.insert(Task::STATUS.into(), document::enum_value(&status));
        }
        for (key, value) in [
            ("startDate", self.start_date),
            ("endDate", self.end_date),
            ("dueDate", self.due_date),
        ] {
            if let Some(at) = value {
                doc.insert(key.into(), document::opt_timestamp_value(at));
            }
        }
        doc
    }
}
