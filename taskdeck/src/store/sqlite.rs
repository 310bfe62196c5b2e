//! Persistent document store on SQLite.
//!
//! Every document lives in one `documents` row keyed by `(collection, id)`,
//! its fields serialized as a JSON object. `seq` is assigned by SQLite on
//! insert, records insertion order and is what queries are ordered by.
//! Filters are evaluated in process.

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    ExecResult, FromQueryResult, Statement, TransactionTrait,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{CHANGE_CHANNEL_CAPACITY, ChangeNotification, DocumentStore, Query, WriteKind, merge};
use crate::document::{Document, StoredDocument};
use crate::error::StoreError;

/// Document store backed by a SQLite database through sea-orm.
pub struct SqliteStore {
    conn: DatabaseConnection,
    change_tx: broadcast::Sender<ChangeNotification>,
}

/// Create the `documents` table if it does not already exist.
async fn create_documents_table(db: &impl ConnectionTrait) -> Result<ExecResult, DbErr> {
    db.execute_unprepared(
        "CREATE TABLE IF NOT EXISTS documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            UNIQUE (collection, id)
        )",
    )
    .await
}

#[derive(Debug, FromQueryResult)]
struct DocumentRow {
    id: String,
    data: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<StoredDocument, StoreError> {
        let fields: Document = serde_json::from_str(&self.data)?;
        Ok(StoredDocument::new(self.id, fields))
    }
}

fn select_one(collection: &str, id: &str) -> Statement {
    Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "SELECT id, data FROM documents WHERE collection = ? AND id = ?",
        [collection.into(), id.into()],
    )
}

fn insert(collection: &str, id: &str, data: String) -> Statement {
    Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)",
        [collection.into(), id.into(), data.into()],
    )
}

fn replace_data(collection: &str, id: &str, data: String) -> Statement {
    Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "UPDATE documents SET data = ? WHERE collection = ? AND id = ?",
        [data.into(), collection.into(), id.into()],
    )
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite:./taskdeck.db?mode=rwc` or
    /// `sqlite::memory:`) and create the documents table.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let mut opts = ConnectOptions::new(url);
        if url.contains(":memory:") {
            // Each pooled connection would otherwise open its own empty database.
            opts.max_connections(1).min_connections(1);
        }
        let conn = Database::connect(opts).await?;
        create_documents_table(&conn).await?;
        log::info!("Document store ready at {url}");

        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { conn, change_tx })
    }

    /// The underlying sea-orm connection.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn notify(&self, collection: &str, id: &str, kind: WriteKind) {
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
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let data = serde_json::to_string(&fields)?;
        self.conn.execute_raw(insert(collection, &id, data)).await?;
        self.notify(collection, &id, WriteKind::Insert);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let data = serde_json::to_string(&fields)?;
        let txn = self.conn.begin().await?;
        let existing = DocumentRow::find_by_statement(select_one(collection, id))
            .one(&txn)
            .await?;
        let kind = if existing.is_some() {
            txn.execute_raw(replace_data(collection, id, data)).await?;
            WriteKind::Update
        } else {
            txn.execute_raw(insert(collection, id, data)).await?;
            WriteKind::Insert
        };
        txn.commit().await?;
        self.notify(collection, id, kind);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        DocumentRow::find_by_statement(select_one(collection, id))
            .one(&self.conn)
            .await?
            .map(DocumentRow::into_document)
            .transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        let rows = DocumentRow::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT id, data FROM documents WHERE collection = ? ORDER BY seq ASC",
            [query.collection.clone().into()],
        ))
        .all(&self.conn)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let doc = row.into_document()?;
            if query.matches(&doc.fields) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let txn = self.conn.begin().await?;
        let mut existing = DocumentRow::find_by_statement(select_one(collection, id))
            .one(&txn)
            .await?
            .ok_or_else(|| Self::not_found(collection, id))?
            .into_document()?;
        merge(&mut existing.fields, fields);
        let data = serde_json::to_string(&existing.fields)?;
        txn.execute_raw(replace_data(collection, id, data)).await?;
        txn.commit().await?;
        self.notify(collection, id, WriteKind::Update);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = self
            .conn
            .execute_raw(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                [collection.into(), id.into()],
            ))
            .await?;
        if result.rows_affected() == 0 {
            return Err(Self::not_found(collection, id));
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

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory store")
    }

    #[tokio::test]
    async fn documents_persist_as_json() {
        let store = store().await;
        let id = store
            .create("projects", doc(json!({ "name": "Launch", "managerId": "m1" })))
            .await
            .expect("Failed to create");

        store
            .update("projects", &id, doc(json!({ "status": "on-hold" })))
            .await
            .expect("Failed to update");

        let found = store.get("projects", &id).await.unwrap().unwrap();
        assert_eq!(
            Value::Object(found.fields),
            json!({ "name": "Launch", "managerId": "m1", "status": "on-hold" })
        );
    }

    #[tokio::test]
    async fn queries_follow_insertion_order_and_filters() {
        let store = store().await;
        store.set("users", "z", doc(json!({ "role": "user" }))).await.unwrap();
        store.set("users", "a", doc(json!({ "role": "admin" }))).await.unwrap();
        store.set("users", "m", doc(json!({ "role": "user" }))).await.unwrap();
        store.set("users", "z", doc(json!({ "role": "user", "name": "Zed" }))).await.unwrap();

        let all = store.query(&Query::collection("users")).await.unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "m"]);

        let users = store
            .query(&Query::collection("users").filter(Filter::eq("role", "user")))
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].fields.get("name"), Some(&json!("Zed")));
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let store = store().await;
        let mut rx = store.changes();
        let id = store.create("tasks", Document::new()).await.unwrap();
        store.delete("tasks", &id).await.unwrap();
        assert!(matches!(
            store.delete("tasks", &id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.update("tasks", &id, Document::new()).await,
            Err(StoreError::NotFound { .. })
        ));

        assert_eq!(rx.try_recv().unwrap().kind, WriteKind::Insert);
        assert_eq!(rx.try_recv().unwrap().kind, WriteKind::Delete);
        assert!(rx.try_recv().is_err());
    }

    #[derive(Debug, FromQueryResult)]
    struct SeqCount {
        total: i64,
        distinct_seqs: i64,
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_positions() {
        let path = std::env::temp_dir().join(format!("taskdeck-{}.db", Uuid::new_v4().simple()));
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let store = std::sync::Arc::new(SqliteStore::connect(&url).await.unwrap());

        let mut writers = tokio::task::JoinSet::new();
        for n in 0..16 {
            let store = store.clone();
            writers.spawn(async move {
                store
                    .create("tasks", doc(json!({ "n": n })))
                    .await
                    .expect("Failed to create")
            });
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap();
        }

        let counts = SeqCount::find_by_statement(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(*) AS total, COUNT(DISTINCT seq) AS distinct_seqs FROM documents",
        ))
        .one(store.inner())
        .await
        .unwrap()
        .unwrap();
        assert_eq!(counts.total, 16);
        assert_eq!(counts.distinct_seqs, 16);
        assert_eq!(store.query(&Query::collection("tasks")).await.unwrap().len(), 16);

        drop(store);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
