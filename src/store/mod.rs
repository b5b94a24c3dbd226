//! Persistent store for entity records
//!
//! Records are documents addressed by `(id, partition key)`; the partition key
//! is the record's set id.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::EntityRecord;
use async_trait::async_trait;

#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Point read
    async fn get_by_key(&self, id: &str, partition_key: i64) -> Result<Option<EntityRecord>>;

    /// Every record in a partition
    async fn query_by_partition(&self, partition_key: i64) -> Result<Vec<EntityRecord>>;

    /// Insert or replace; returns the request cost reported by the store
    async fn upsert(&self, record: &EntityRecord) -> Result<f64>;
}
