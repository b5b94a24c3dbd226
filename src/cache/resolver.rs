//! Cache-aside resolution: cache → store → source.
//!
//! The store lookup and the source fetch are supplied per call, so the same
//! resolver serves cards, sets and anything else that serializes.

use super::envelope::{now_epoch_ms, CacheEnvelope};
use super::tier::CacheTier;
use crate::error::Result;
use crate::retry::with_timeout;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Extra detached work started alongside the cache write of a fetched value
pub type WriteBack = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// TTL and freshness settings for a single resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub ttl_seconds: u64,
    /// Skip the cache read (the result is still written back)
    pub force_refresh: bool,
}

impl ResolvePolicy {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            force_refresh: false,
        }
    }

    pub fn refreshing(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            force_refresh: true,
        }
    }
}

/// Which tier answered a resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    Cache,
    Store,
    Source,
    /// Every tier answered "absent"
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub data: Option<T>,
    /// True only when served from an unexpired cache envelope
    pub hit: bool,
    pub age_seconds: u64,
    pub from: ResolvedFrom,
}

impl<T> Resolved<T> {
    fn fresh(data: Option<T>, from: ResolvedFrom) -> Self {
        Self {
            data,
            hit: false,
            age_seconds: 0,
            from,
        }
    }
}

pub struct CacheAsideResolver {
    /// `None` disables the cache tier
    cache: Option<Arc<dyn CacheTier>>,
    timeout: Duration,
}

impl CacheAsideResolver {
    pub fn new(cache: Option<Arc<dyn CacheTier>>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Get-or-populate `key`.
    ///
    /// Cache read failures count as misses. Store lookup and fetch failures
    /// propagate. A fetch returning `None` is a not-found and leaves the cache
    /// untouched.
    pub async fn resolve<T, L, LF, F, FF>(
        &self,
        key: &str,
        policy: ResolvePolicy,
        lookup: L,
        fetch: F,
    ) -> Result<Resolved<T>>
    where
        T: Serialize + DeserializeOwned,
        L: FnOnce() -> LF,
        LF: Future<Output = Result<Option<T>>>,
        F: FnOnce() -> FF,
        FF: Future<Output = Result<Option<T>>>,
    {
        self.resolve_with(key, policy, lookup, fetch, |_: &T| None)
            .await
    }

    /// [`resolve`](Self::resolve), plus `on_fetched` work for a value the
    /// source produced.
    ///
    /// The cache write and that work start on one detached task before the
    /// resolve awaits anything else, so both finish even if the caller drops
    /// the future.
    pub async fn resolve_with<T, L, LF, F, FF, P>(
        &self,
        key: &str,
        policy: ResolvePolicy,
        lookup: L,
        fetch: F,
        on_fetched: P,
    ) -> Result<Resolved<T>>
    where
        T: Serialize + DeserializeOwned,
        L: FnOnce() -> LF,
        LF: Future<Output = Result<Option<T>>>,
        F: FnOnce() -> FF,
        FF: Future<Output = Result<Option<T>>>,
        P: FnOnce(&T) -> Option<WriteBack>,
    {
        if !policy.force_refresh {
            if let Some((data, age)) = self.read::<T>(key).await {
                log::debug!("Cache hit for {} (age {}s)", key, age);
                return Ok(Resolved {
                    data: Some(data),
                    hit: true,
                    age_seconds: age,
                    from: ResolvedFrom::Cache,
                });
            }
            log::debug!("Cache miss for {}", key);
        }

        if let Some(stored) = lookup().await? {
            log::debug!("Store hit for {}", key);
            self.write_back(key, &stored, policy.ttl_seconds, None).await;
            return Ok(Resolved::fresh(Some(stored), ResolvedFrom::Store));
        }

        match fetch().await? {
            Some(fetched) => {
                log::info!("Resolved {} from source", key);
                let extra = on_fetched(&fetched);
                self.write_back(key, &fetched, policy.ttl_seconds, extra)
                    .await;
                Ok(Resolved::fresh(Some(fetched), ResolvedFrom::Source))
            }
            None => {
                log::info!("{} not found at any tier", key);
                Ok(Resolved::fresh(None, ResolvedFrom::Missing))
            }
        }
    }

    /// Write a fresh envelope for `key` without resolving (bulk paths)
    pub async fn prime<T: Serialize>(&self, key: &str, data: &T, ttl_seconds: u64) {
        self.write_back(key, data, ttl_seconds, None).await;
    }

    /// Drop `key` from the cache tier. Best-effort.
    pub async fn invalidate(&self, key: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        match with_timeout(self.timeout, "cache delete", cache.delete(key)).await {
            Ok(()) => log::debug!("Invalidated cache entry {}", key),
            Err(e) => log::warn!("Failed to invalidate cache entry {}: {}", key, e),
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<(T, u64)> {
        let cache = self.cache.as_ref()?;

        let bytes = match with_timeout(self.timeout, "cache get", cache.get(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                return None;
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Undecodable cache entry for {}, treating as miss: {}", key, e);
                return None;
            }
        };

        let fresh = envelope.into_fresh(now_epoch_ms());
        if fresh.is_none() {
            log::debug!("Cache entry for {} expired", key);
        }
        fresh
    }

    /// Store a fresh envelope and run `extra` on one detached task, then
    /// wait for it. The task is spawned before the first await, so dropping
    /// the caller doesn't stop it. Failures are only logged.
    async fn write_back<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl_seconds: u64,
        extra: Option<WriteBack>,
    ) {
        let cache_write = self.cache.as_ref().and_then(|cache| {
            match serde_json::to_vec(&CacheEnvelope::new(data, ttl_seconds)) {
                Ok(bytes) => Some((Arc::clone(cache), bytes)),
                Err(e) => {
                    log::warn!("Failed to serialize cache entry for {}: {}", key, e);
                    None
                }
            }
        });
        if cache_write.is_none() && extra.is_none() {
            return;
        }

        let key = key.to_string();
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let cache = async {
                let Some((cache, bytes)) = cache_write else {
                    return;
                };
                match with_timeout(timeout, "cache set", cache.set(&key, bytes, ttl_seconds)).await
                {
                    Ok(()) => log::debug!("Cached {} for {}s", key, ttl_seconds),
                    Err(e) => log::warn!("Failed to write cache entry {}: {}", key, e),
                }
            };
            let extra = async {
                if let Some(extra) = extra {
                    extra.await;
                }
            };
            tokio::join!(cache, extra);
        });

        if let Err(e) = task.await {
            log::warn!("Write-back task failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
