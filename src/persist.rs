//! Batch persistence with bounded concurrency
//!
//! Records are split into chunks. Up to `MAX_CONCURRENT_CHUNKS` chunks are in
//! flight at once and every record in a chunk is upserted concurrently. A
//! failed record is counted and reported but never stops its siblings.

use crate::models::EntityRecord;
use crate::retry::with_timeout;
use crate::store::PersistentStore;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Records per chunk
pub const CHUNK_SIZE: usize = 25;

/// Chunks written concurrently
pub const MAX_CONCURRENT_CHUNKS: usize = 4;

/// Pause between successive groups of chunks
pub const CHUNK_GROUP_PAUSE: Duration = Duration::from_millis(100);

/// One record that could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub id: String,
    pub error: String,
}

/// Result of a single upsert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub id: String,
    pub succeeded: bool,
    /// Store cost of the write, 0 when it failed
    pub request_cost: f64,
}

/// Per-record results of a batch write and their totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub saved: usize,
    pub failed: usize,
    pub total_cost: f64,
    pub elapsed_ms: u64,
    /// One entry per input record, in input order
    pub records: Vec<RecordOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RecordFailure>,
}

impl BatchOutcome {
    /// Number of records the batch was given
    pub fn input_count(&self) -> usize {
        self.saved + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, id: &str, result: crate::error::Result<f64>) {
        let request_cost = result.as_ref().map_or(0.0, |cost| *cost);
        self.records.push(RecordOutcome {
            id: id.to_string(),
            succeeded: result.is_ok(),
            request_cost,
        });

        match result {
            Ok(cost) => {
                self.saved += 1;
                self.total_cost += cost;
            }
            Err(e) => {
                log::warn!("Failed to save {}: {}", id, e);
                self.failed += 1;
                self.failures.push(RecordFailure {
                    id: id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

pub struct BatchWriter {
    store: Arc<dyn PersistentStore>,
    chunk_size: usize,
    max_concurrent_chunks: usize,
    pause: Duration,
    timeout: Duration,
}

impl BatchWriter {
    /// Writer with the default chunking; `timeout` bounds each upsert
    pub fn new(store: Arc<dyn PersistentStore>, timeout: Duration) -> Self {
        Self {
            store,
            chunk_size: CHUNK_SIZE,
            max_concurrent_chunks: MAX_CONCURRENT_CHUNKS,
            pause: CHUNK_GROUP_PAUSE,
            timeout,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_concurrent_chunks(mut self, max_concurrent_chunks: usize) -> Self {
        self.max_concurrent_chunks = max_concurrent_chunks.max(1);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    /// Upsert every record. Failures are reported in the outcome, not
    /// returned as an error.
    pub async fn save_all(&self, records: &[EntityRecord]) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();

        if records.is_empty() {
            return outcome;
        }

        let chunks: Vec<&[EntityRecord]> = records.chunks(self.chunk_size).collect();
        for (group_index, group) in chunks.chunks(self.max_concurrent_chunks).enumerate() {
            if group_index > 0 {
                tokio::time::sleep(self.pause).await;
            }

            let results = join_all(group.iter().map(|chunk| self.save_chunk(chunk))).await;
            for (id, result) in results.into_iter().flatten() {
                outcome.record(id, result);
            }
        }

        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Saved {}/{} records in {} chunk(s), cost {:.1}, {}ms",
            outcome.saved,
            records.len(),
            chunks.len(),
            outcome.total_cost,
            outcome.elapsed_ms
        );
        if outcome.failed > 0 {
            log::warn!("{} record(s) failed to save", outcome.failed);
        }
        outcome
    }

    async fn save_chunk<'a>(
        &self,
        chunk: &'a [EntityRecord],
    ) -> Vec<(&'a str, crate::error::Result<f64>)> {
        join_all(chunk.iter().map(|record| async move {
            let result = with_timeout(self.timeout, "store upsert", self.store.upsert(record)).await;
            (record.id.as_str(), result)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn records(count: i64) -> Vec<EntityRecord> {
        (1..=count)
            .map(|i| EntityRecord::card(i, 501, "Card", &i.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let writer = BatchWriter::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        let outcome = writer.save_all(&[]).await;
        assert_eq!(outcome, BatchOutcome::default());
    }

    #[tokio::test]
    async fn saves_across_several_groups() {
        let store = Arc::new(MemoryStore::new());
        let writer = BatchWriter::new(store.clone(), Duration::from_secs(1))
            .with_chunk_size(2)
            .with_max_concurrent_chunks(2)
            .with_pause(Duration::from_millis(1));

        let outcome = writer.save_all(&records(9)).await;
        assert_eq!(outcome.saved, 9);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.total_cost, 9.0);
        assert!(outcome.is_complete());
        assert_eq!(store.len().await, 9);
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let outcome = BatchOutcome {
            saved: 9,
            failed: 1,
            total_cost: 9.0,
            elapsed_ms: 12,
            records: vec![RecordOutcome {
                id: "ppt-7".to_string(),
                succeeded: false,
                request_cost: 0.0,
            }],
            failures: vec![RecordFailure {
                id: "ppt-7".to_string(),
                error: "boom".to_string(),
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["totalCost"], 9.0);
        assert_eq!(json["elapsedMs"], 12);
        assert_eq!(json["failures"][0]["id"], "ppt-7");
        assert_eq!(json["records"][0]["succeeded"], false);
        assert_eq!(json["records"][0]["requestCost"], 0.0);
        assert_eq!(outcome.input_count(), 10);
    }
}
