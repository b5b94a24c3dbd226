//! Tests for the cache-aside resolver

use super::*;
use crate::cache::tier::MemoryCache;
use crate::error::ResolverError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Thing {
    name: String,
    value: u32,
}

fn thing(name: &str) -> Thing {
    Thing {
        name: name.to_string(),
        value: 7,
    }
}

/// Cache tier whose every call fails
struct BrokenCache;

#[async_trait]
impl CacheTier for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(ResolverError::source_unavailable("cache", "connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl_seconds: u64) -> Result<()> {
        Err(ResolverError::source_unavailable("cache", "connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(ResolverError::source_unavailable("cache", "connection refused"))
    }
}

fn resolver_with(cache: Arc<dyn CacheTier>) -> CacheAsideResolver {
    CacheAsideResolver::new(Some(cache), Duration::from_secs(1))
}

async fn no_store() -> Result<Option<Thing>> {
    Ok(None)
}

async fn must_not_fetch() -> Result<Option<Thing>> {
    panic!("source must not be called")
}

#[tokio::test]
async fn miss_then_hit_with_identical_data() {
    let resolver = resolver_with(Arc::new(MemoryCache::new()));
    let fetches = AtomicUsize::new(0);
    let fetch = || async {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Some(thing("Amarys")))
    };

    let first = resolver
        .resolve("card-1", ResolvePolicy::new(60), no_store, fetch)
        .await
        .unwrap();
    let second = resolver
        .resolve("card-1", ResolvePolicy::new(60), no_store, fetch)
        .await
        .unwrap();

    assert!(!first.hit);
    assert_eq!(first.from, ResolvedFrom::Source);
    assert!(second.hit);
    assert_eq!(second.from, ResolvedFrom::Cache);
    assert_eq!(first.data, second.data);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn store_hit_skips_source_and_populates_cache() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(cache.clone());

    let resolved = resolver
        .resolve(
            "card-2",
            ResolvePolicy::new(60),
            || async { Ok(Some(thing("stored"))) },
            must_not_fetch,
        )
        .await
        .unwrap();

    assert_eq!(resolved.from, ResolvedFrom::Store);
    assert!(!resolved.hit);
    assert!(cache.get("card-2").await.unwrap().is_some());
}

#[tokio::test]
async fn not_found_is_not_cached() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(cache.clone());

    let resolved: Resolved<Thing> = resolver
        .resolve("card-3", ResolvePolicy::new(60), no_store, || async {
            Ok(None)
        })
        .await
        .unwrap();

    assert!(resolved.data.is_none());
    assert_eq!(resolved.from, ResolvedFrom::Missing);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn force_refresh_bypasses_cache_and_rewrites() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(cache.clone());

    resolver
        .resolve("card-4", ResolvePolicy::new(60), no_store, || async {
            Ok(Some(thing("old")))
        })
        .await
        .unwrap();

    let refreshed = resolver
        .resolve("card-4", ResolvePolicy::refreshing(60), no_store, || async {
            Ok(Some(thing("new")))
        })
        .await
        .unwrap();
    assert!(!refreshed.hit);
    assert_eq!(refreshed.data.unwrap().name, "new");

    let cached = resolver
        .resolve("card-4", ResolvePolicy::new(60), no_store, must_not_fetch)
        .await
        .unwrap();
    assert!(cached.hit);
    assert_eq!(cached.data.unwrap().name, "new");
}

#[tokio::test]
async fn expired_envelope_is_treated_as_absent() {
    let cache = Arc::new(MemoryCache::new());
    // Physically present, logically expired
    let stale = CacheEnvelope::written_at(thing("stale"), 10, now_epoch_ms() - 60_000);
    cache
        .set("card-5", serde_json::to_vec(&stale).unwrap(), 3600)
        .await
        .unwrap();

    let resolver = resolver_with(cache);
    let resolved = resolver
        .resolve("card-5", ResolvePolicy::new(60), no_store, || async {
            Ok(Some(thing("fresh")))
        })
        .await
        .unwrap();

    assert!(!resolved.hit);
    assert_eq!(resolved.data.unwrap().name, "fresh");
}

#[tokio::test]
async fn hit_reports_age() {
    let cache = Arc::new(MemoryCache::new());
    let envelope = CacheEnvelope::written_at(thing("aged"), 3600, now_epoch_ms() - 120_000);
    cache
        .set("card-6", serde_json::to_vec(&envelope).unwrap(), 3600)
        .await
        .unwrap();

    let resolver = resolver_with(cache);
    let resolved = resolver
        .resolve("card-6", ResolvePolicy::new(3600), no_store, must_not_fetch)
        .await
        .unwrap();

    assert!(resolved.hit);
    assert!(resolved.age_seconds >= 120);
}

#[tokio::test]
async fn undecodable_entry_is_a_miss() {
    let cache = Arc::new(MemoryCache::new());
    cache.set("card-7", b"garbage".to_vec(), 60).await.unwrap();

    let resolver = resolver_with(cache);
    let resolved = resolver
        .resolve("card-7", ResolvePolicy::new(60), no_store, || async {
            Ok(Some(thing("fresh")))
        })
        .await
        .unwrap();

    assert_eq!(resolved.from, ResolvedFrom::Source);
}

#[tokio::test]
async fn broken_cache_never_fails_resolve() {
    let resolver = resolver_with(Arc::new(BrokenCache));

    let resolved = resolver
        .resolve("card-8", ResolvePolicy::new(60), no_store, || async {
            Ok(Some(thing("from source")))
        })
        .await
        .unwrap();

    assert_eq!(resolved.data.unwrap().name, "from source");
    resolver.invalidate("card-8").await;
}

#[tokio::test]
async fn disabled_cache_always_goes_to_source() {
    let resolver = CacheAsideResolver::new(None, Duration::from_secs(1));
    assert!(!resolver.is_cache_enabled());
    let fetches = AtomicUsize::new(0);

    for _ in 0..2 {
        let resolved = resolver
            .resolve("card-9", ResolvePolicy::new(60), no_store, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(Some(thing("x")))
            })
            .await
            .unwrap();
        assert!(!resolved.hit);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn source_error_propagates_and_is_not_cached() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(cache.clone());

    let result: Result<Resolved<Thing>> = resolver
        .resolve("card-10", ResolvePolicy::new(60), no_store, || async {
            Err(ResolverError::source_unavailable("ppt", "timeout"))
        })
        .await;

    assert!(matches!(result, Err(ResolverError::SourceUnavailable { .. })));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn store_error_propagates() {
    let resolver = resolver_with(Arc::new(MemoryCache::new()));

    let result: Result<Resolved<Thing>> = resolver
        .resolve(
            "card-11",
            ResolvePolicy::new(60),
            || async { Err(ResolverError::Persistence("store down".to_string())) },
            || async { Ok(Some(thing("unused"))) },
        )
        .await;

    assert!(matches!(result, Err(ResolverError::Persistence(_))));
}

#[tokio::test]
async fn invalidate_drops_entry() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(cache.clone());
    resolver.prime("card-12", &thing("primed"), 60).await;
    assert!(cache.get("card-12").await.unwrap().is_some());

    resolver.invalidate("card-12").await;
    assert!(cache.get("card-12").await.unwrap().is_none());
}
