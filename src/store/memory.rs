use super::PersistentStore;
use crate::error::Result;
use crate::models::EntityRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store, used when no database is configured
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(i64, String), EntityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_by_key(&self, id: &str, partition_key: i64) -> Result<Option<EntityRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(partition_key, id.to_string()))
            .cloned())
    }

    async fn query_by_partition(&self, partition_key: i64) -> Result<Vec<EntityRecord>> {
        let records = self.records.read().await;
        let mut found: Vec<EntityRecord> = records
            .iter()
            .filter(|((partition, _), _)| *partition == partition_key)
            .map(|(_, record)| record.clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn upsert(&self, record: &EntityRecord) -> Result<f64> {
        self.records
            .write()
            .await
            .insert((record.set_id, record.id.clone()), record.clone());
        Ok(1.0)
    }
}
