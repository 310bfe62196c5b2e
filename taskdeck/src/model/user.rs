use chrono::{DateTime, Utc};

use super::{Entity, Role, fields};
use crate::document::{self, Document};

/// A registered account's profile. The document id is the auth uid.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) const ROLE: &'static str = "role";

    /// Profile document written at self-registration. The role is always
    /// [`Role::User`].
    pub(crate) fn registration_document(email: &str, name: &str, now: DateTime<Utc>) -> Document {
        let mut doc = Document::new();
        doc.insert("email".into(), email.into());
        doc.insert("name".into(), name.into());
        doc.insert(Self::ROLE.into(), document::enum_value(&Role::User));
        doc.insert(fields::CREATED_AT.into(), document::timestamp_value(now));
        doc.insert(fields::UPDATED_AT.into(), document::timestamp_value(now));
        doc
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn from_document(id: &str, doc: &Document, now: DateTime<Utc>) -> Self {
        User {
            id: id.to_string(),
            email: document::string_field(doc, "email"),
            name: document::string_field(doc, "name"),
            role: document::enum_field(doc, Self::ROLE),
            created_at: document::timestamp_field(doc, fields::CREATED_AT).unwrap_or(now),
        }
    }

    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| a.name.cmp(&b.name));
    }
}
