use serde::{Deserialize, Serialize};

/// Cached value wrapped with its write time and TTL.
///
/// An envelope is logically expired once `now - written_at > ttl`, whether or
/// not the cache tier still holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope<T> {
    pub data: T,
    pub written_at_epoch_ms: i64,
    pub ttl_seconds: u64,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<T> CacheEnvelope<T> {
    pub fn new(data: T, ttl_seconds: u64) -> Self {
        Self::written_at(data, ttl_seconds, now_epoch_ms())
    }

    pub fn written_at(data: T, ttl_seconds: u64, written_at_epoch_ms: i64) -> Self {
        Self {
            data,
            written_at_epoch_ms,
            ttl_seconds,
        }
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.written_at_epoch_ms) > self.ttl_ms()
    }

    /// Whole seconds since the envelope was written (never negative)
    pub fn age_seconds_at(&self, now_ms: i64) -> u64 {
        let age_ms = now_ms.saturating_sub(self.written_at_epoch_ms).max(0);
        (age_ms / 1000) as u64
    }

    /// Unwrap the data if the envelope is still fresh at `now_ms`
    pub fn into_fresh(self, now_ms: i64) -> Option<(T, u64)> {
        if self.is_expired_at(now_ms) {
            return None;
        }
        let age = self.age_seconds_at(now_ms);
        Some((self.data, age))
    }
}
