use chrono::{DateTime, Utc};

use super::{Entity, ProjectStatus, fields, newest_first};
use crate::document::{self, Document};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Id of the user who created the project.
    pub manager_id: String,
    pub status: ProjectStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub(crate) const MANAGER_ID: &'static str = "managerId";
    pub(crate) const STATUS: &'static str = "status";
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";

    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self {
        Project {
            id: id.to_string(),
            name: document::string_field(doc, "name"),
            description: document::string_field(doc, "description"),
            manager_id: document::string_field(doc, Self::MANAGER_ID),
            status: document::enum_field(doc, Self::STATUS),
            start_date: document::timestamp_field(doc, "startDate").unwrap_or(now),
            end_date: document::timestamp_field(doc, "endDate"),
            created_at: document::timestamp_field(doc, fields::CREATED_AT).unwrap_or(now),
            updated_at: document::timestamp_field(doc, fields::UPDATED_AT).unwrap_or(now),
        }
    }

    fn sort(items: &mut [Self]) {
        newest_first(items, |p| p.created_at);
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    /// Defaults to the write time.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewProject {
    pub(crate) fn into_document(self, manager_id: &str, now: DateTime<Utc>) -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), self.name.trim().into());
        doc.insert("description".into(), self.description.trim().into());
        doc.insert(Project::MANAGER_ID.into(), manager_id.into());
        doc.insert(
            Project::STATUS.into(),
            document::enum_value(&ProjectStatus::Active),
        );
        doc.insert(
            "startDate".into(),
            document::timestamp_value(self.start_date.unwrap_or(now)),
        );
        if let Some(end) = self.end_date {
            doc.insert("endDate".into(), document::timestamp_value(end));
        }
        doc
    }
}

/// Partial edit of a project. The manager is fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the end date.
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl ProjectPatch {
    pub(crate) fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(name) = self.name {
            doc.insert("name".into(), name.trim().into());
        }
        if let Some(description) = self.description {
            doc.insert("description".into(), description.trim().into());
        }
        if let Some(status) = self.status {
            doc.insert(Project::STATUS.into(), document::enum_value(&status));
        }
        if let Some(start) = self.start_date {
            doc.insert("startDate".into(), document::timestamp_value(start));
        }
        if let Some(end) = self.end_date {
            doc.insert("endDate".into(), document::opt_timestamp_value(end));
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_stored_project() {
        let now = Utc::now();
        let doc = json!({
            "name": "Launch",
            "managerId": "m1",
            "status": "on-hold",
            "endDate": { "seconds": 1_700_000_000i64, "nanoseconds": 0 },
        });
        let project = Project::from_document("p1", doc.as_object().unwrap(), now);
        assert_eq!(project.name, "Launch");
        assert_eq!(project.description, "");
        assert_eq!(project.status, ProjectStatus::OnHold);
        assert_eq!(project.start_date, now);
        assert_eq!(project.end_date.map(|d| d.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn new_project_starts_active() {
        let now = Utc::now();
        let doc = NewProject {
            name: "Launch".into(),
            ..Default::default()
        }
        .into_document("m1", now);
        assert_eq!(doc.get("status"), Some(&json!("active")));
        assert_eq!(doc.get("managerId"), Some(&json!("m1")));
        assert_eq!(doc.get("startDate"), Some(&document::timestamp_value(now)));
        assert!(!doc.contains_key("endDate"));
    }
}
