//! SQLite-backed document store
//!
//! Uses parameterized queries exclusively. Each record is stored as its JSON
//! document under `(id, partition_key)`. rusqlite is blocking, so every call
//! runs on the blocking pool behind a shared connection.

use super::PersistentStore;
use crate::error::{ResolverError, Result};
use crate::models::EntityRecord;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Cost unit per started KiB of document written
const COST_PER_KIB: f64 = 1.0;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        log::info!("Opened database: {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ResolverError::Persistence("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| ResolverError::Persistence(format!("store task failed: {}", e)))?
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM entity_records", [], |row| row.get(0))?)
        })
        .await
    }
}

/// Create the records table if it doesn't exist
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entity_records (
            id TEXT NOT NULL,
            partition_key INTEGER NOT NULL,
            kind TEXT NOT NULL,
            document TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (id, partition_key)
        );

        CREATE INDEX IF NOT EXISTS idx_entity_records_partition ON entity_records(partition_key);
        ",
    )?;

    log::debug!("Database schema initialized");
    Ok(())
}

fn decode(document: &str) -> Result<EntityRecord> {
    Ok(serde_json::from_str(document)?)
}

fn kind_label(record: &EntityRecord) -> &'static str {
    if record.is_card() {
        "card"
    } else {
        "set"
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn get_by_key(&self, id: &str, partition_key: i64) -> Result<Option<EntityRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM entity_records WHERE id = ?1 AND partition_key = ?2",
                    params![id, partition_key],
                    |row| row.get(0),
                )
                .optional()?;
            document.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn query_by_partition(&self, partition_key: i64) -> Result<Vec<EntityRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document FROM entity_records WHERE partition_key = ?1 ORDER BY id",
            )?;
            let documents = stmt
                .query_map(params![partition_key], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            documents.iter().map(|d| decode(d)).collect()
        })
        .await
    }

    async fn upsert(&self, record: &EntityRecord) -> Result<f64> {
        let document = serde_json::to_string(record)?;
        let id = record.id.clone();
        let partition_key = record.set_id;
        let kind = kind_label(record);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO entity_records (id, partition_key, kind, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(id, partition_key) DO UPDATE SET
                     kind = excluded.kind,
                     document = excluded.document,
                     updated_at = excluded.updated_at",
                params![id, partition_key, kind, document],
            )?;
            let kib = document.len().div_ceil(1024).max(1);
            Ok(kib as f64 * COST_PER_KIB)
        })
        .await
    }
}
