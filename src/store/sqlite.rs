use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::schema;
use super::{
    apply_writes, CollectionPath, Document, DocumentPath, DocumentStore, Fields, LiveQueries,
    Subscription, WriteSet,
};
use crate::error::StoreError;

/// Document store persisted in a local SQLite file. Live queries are served
/// in-process, so only subscribers inside this process see pushes.
pub(crate) struct SqliteStore {
    conn: Mutex<Connection>,
    live: LiveQueries,
}

impl SqliteStore {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            live: LiveQueries::default(),
        })
    }

    fn write(
        &self,
        doc: &DocumentPath,
        writes: WriteSet,
        must_exist: bool,
        replace: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let existing = load_fields(&conn, doc)?;
        if must_exist && existing.is_none() {
            return Err(StoreError::NotFound(doc.to_string()));
        }
        let mut fields = if replace {
            Fields::new()
        } else {
            existing.unwrap_or_default()
        };
        apply_writes(doc, &mut fields, writes, Some(Utc::now()))?;
        conn.execute(
            "INSERT INTO documents (collection, id, fields, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id)
             DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
            params![
                doc.collection.as_str(),
                doc.id,
                serde_json::to_string(&fields)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        self.notify(&conn, &doc.collection)
    }

    fn notify(&self, conn: &Connection, collection: &CollectionPath) -> Result<(), StoreError> {
        if self.live.has_listeners(collection) {
            self.live.publish(collection, load_collection(conn, collection)?);
        }
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let has_version_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !has_version_table {
        conn.execute_batch(schema::SCHEMA_V1)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![schema::CURRENT_VERSION],
        )?;
        return Ok(());
    }

    let current: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for &(from_version, sql) in schema::MIGRATIONS {
        if current <= from_version {
            conn.execute_batch(sql)?;
        }
    }

    if current < schema::CURRENT_VERSION {
        conn.execute(
            "UPDATE schema_version SET version = ?1",
            params![schema::CURRENT_VERSION],
        )?;
    }
    Ok(())
}

fn load_fields(conn: &Connection, doc: &DocumentPath) -> Result<Option<Fields>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE collection = ?1 AND id = ?2",
            params![doc.collection.as_str(), doc.id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw
        .map(|s| serde_json::from_str::<Fields>(&s))
        .transpose()?)
}

fn load_collection(
    conn: &Connection,
    collection: &CollectionPath,
) -> Result<Vec<Document>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![collection.as_str()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut documents = Vec::new();
    for row in rows {
        let (id, raw) = row?;
        documents.push(Document {
            id,
            fields: serde_json::from_str(&raw)?,
        });
    }
    Ok(documents)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_with_id(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.write(doc, writes, false, true)
    }

    async fn create(
        &self,
        collection: &CollectionPath,
        writes: WriteSet,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.write(&collection.doc(&id), writes, false, true)?;
        Ok(id)
    }

    async fn update(&self, doc: &DocumentPath, writes: WriteSet) -> Result<(), StoreError> {
        self.write(doc, writes, true, false)
    }

    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![doc.collection.as_str(), doc.id],
        )?;
        if removed == 0 {
            debug!(%doc, "delete of missing document");
            return Ok(());
        }
        self.notify(&conn, &doc.collection)
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        load_collection(&self.conn.lock(), collection)
    }

    fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, StoreError> {
        let conn = self.conn.lock();
        let initial = load_collection(&conn, collection)?;
        Ok(self.live.register(collection, initial))
    }
}
