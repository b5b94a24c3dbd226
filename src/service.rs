//! Resolution service
//!
//! The façade the CLI and the HTTP adapter call. It owns the injected
//! collaborators, builds cache keys, consults the quota gate before metered
//! calls and persists whatever the source produced.

use crate::cache::{CacheAsideResolver, CacheTier, ResolvePolicy, Resolved, WriteBack};
use crate::catalog::{ImageCatalog, PriceCatalog};
use crate::config::Config;
use crate::enrich::{apply_secondary, Enricher};
use crate::error::{ResolverError, Result};
use crate::models::{canonical_id, card_cache_key, set_cache_key, EntityRecord};
use crate::persist::{BatchOutcome, BatchWriter, RecordFailure};
use crate::quota::{GatedPriceCatalog, QuotaGate};
use crate::reconcile::{MatchPolicy, Reconciler};
use crate::retry::{retry_with_backoff, with_timeout, RetryPolicy};
use crate::store::PersistentStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Records enriched concurrently during an import
pub const IMPORT_PARALLELISM: usize = 8;

/// Everything the service talks to, injected once at startup
pub struct Collaborators {
    /// `None` disables the cache tier
    pub cache: Option<Arc<dyn CacheTier>>,
    pub store: Arc<dyn PersistentStore>,
    pub primary: Arc<dyn PriceCatalog>,
    pub secondary: Arc<dyn ImageCatalog>,
    pub gate: Arc<QuotaGate>,
}

/// Response shape of the resolve entry points
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EntityRecord>,
    pub cached: bool,
    pub cache_age_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolveResponse {
    /// Map a resolve outcome for `id` onto the response contract
    pub fn from_result(id: &str, result: Result<Resolved<EntityRecord>>) -> Self {
        match result {
            Ok(Resolved {
                data: Some(record),
                hit,
                age_seconds,
                ..
            }) => Self {
                status: 200,
                data: Some(record),
                cached: hit,
                cache_age_seconds: age_seconds,
                error: None,
            },
            Ok(Resolved { data: None, .. }) => {
                Self::failure(&ResolverError::NotFound(id.to_string()))
            }
            Err(e) => Self::failure(&e),
        }
    }

    pub fn failure(error: &ResolverError) -> Self {
        Self {
            status: error.http_status(),
            data: None,
            cached: false,
            cache_age_seconds: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Summary of a set import
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub set_id: i64,
    pub listed: usize,
    pub enriched: usize,
    pub with_imagery: usize,
    pub enrichment_failures: Vec<RecordFailure>,
    pub persistence: BatchOutcome,
}

/// Summary of an imagery repair pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub set_id: i64,
    /// Stored cards without imagery
    pub scanned: usize,
    pub repaired: usize,
    /// Ids matched only by the numeric-substring tier; worth a manual look
    pub low_confidence: Vec<String>,
    pub unmatched: Vec<String>,
    pub persistence: BatchOutcome,
}

pub struct ResolutionService {
    resolver: CacheAsideResolver,
    store: Arc<dyn PersistentStore>,
    primary: Arc<dyn PriceCatalog>,
    enricher: Arc<Enricher>,
    reconciler: Arc<Reconciler>,
    writer: Arc<BatchWriter>,
    gate: Arc<QuotaGate>,
    card_ttl_secs: u64,
    set_ttl_secs: u64,
    catalog_timeout: Duration,
    store_timeout: Duration,
    retry: RetryPolicy,
}

impl ResolutionService {
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        let Collaborators {
            cache,
            store,
            primary,
            secondary,
            gate,
        } = collaborators;

        let primary: Arc<dyn PriceCatalog> =
            Arc::new(GatedPriceCatalog::new(primary, Arc::clone(&gate)));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&primary),
            Arc::clone(&secondary),
            config.index_ttl,
            config.catalog_timeout,
        ));
        let enricher = Arc::new(Enricher::new(
            Arc::clone(&primary),
            secondary,
            Arc::clone(&reconciler),
            config.catalog_timeout,
        ));
        let writer = Arc::new(BatchWriter::new(Arc::clone(&store), config.store_timeout));

        Self {
            resolver: CacheAsideResolver::new(cache, config.store_timeout),
            store,
            primary,
            enricher,
            reconciler,
            writer,
            gate,
            card_ttl_secs: config.card_ttl_secs,
            set_ttl_secs: config.set_ttl_secs,
            catalog_timeout: config.catalog_timeout,
            store_timeout: config.store_timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the backoff used on the bulk paths
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn gate(&self) -> &Arc<QuotaGate> {
        &self.gate
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Resolve a card through cache, store and source.
    ///
    /// The store is only consulted when the caller knows the card's set (its
    /// partition key). A forced refresh skips both cache and store.
    pub async fn resolve_card(
        &self,
        native_id: i64,
        set_id: Option<i64>,
        force_refresh: bool,
    ) -> Result<Resolved<EntityRecord>> {
        let key = card_cache_key(native_id);
        let id = canonical_id(native_id);
        let partition = if force_refresh { None } else { set_id };

        let resolved = self
            .resolver
            .resolve_with(
                &key,
                self.policy(self.card_ttl_secs, force_refresh),
                || self.lookup(&id, partition),
                || self.fetch_card(native_id),
                |record: &EntityRecord| Some(self.persist_task(record)),
            )
            .await?;

        Ok(resolved)
    }

    /// Resolve a set through cache, store and source
    pub async fn resolve_set(
        &self,
        native_id: i64,
        force_refresh: bool,
    ) -> Result<Resolved<EntityRecord>> {
        let key = set_cache_key(native_id);
        let id = canonical_id(native_id);
        let partition = (!force_refresh).then_some(native_id);

        let resolved = self
            .resolver
            .resolve_with(
                &key,
                self.policy(self.set_ttl_secs, force_refresh),
                || self.lookup(&id, partition),
                || self.fetch_set(native_id),
                |record: &EntityRecord| Some(self.persist_task(record)),
            )
            .await?;

        Ok(resolved)
    }

    pub async fn resolve_card_response(
        &self,
        native_id: i64,
        set_id: Option<i64>,
        force_refresh: bool,
    ) -> ResolveResponse {
        let result = self.resolve_card(native_id, set_id, force_refresh).await;
        ResolveResponse::from_result(&canonical_id(native_id), result)
    }

    pub async fn resolve_set_response(&self, native_id: i64, force_refresh: bool) -> ResolveResponse {
        let result = self.resolve_set(native_id, force_refresh).await;
        ResolveResponse::from_result(&canonical_id(native_id), result)
    }

    /// Import every card of a Catalog A set: list, enrich, save, prime cache.
    ///
    /// Catalog calls are retried with backoff. Cards whose pricing can't be
    /// fetched are reported and skipped.
    pub async fn import_set(&self, set_id: i64) -> Result<ImportReport> {
        self.gate.check()?;
        log::info!("Importing set {}", set_id);

        let cards = retry_with_backoff(&self.retry, "list cards", || {
            with_timeout(
                self.catalog_timeout,
                "list cards",
                self.primary.list_cards(set_id),
            )
        })
        .await?;
        log::info!("Set {} lists {} cards", set_id, cards.len());

        let records: Vec<EntityRecord> = cards.iter().map(EntityRecord::from_primary_card).collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let results = self
            .enricher
            .enrich_many_with_retry(records, IMPORT_PARALLELISM, &self.retry)
            .await;

        let mut enriched = Vec::with_capacity(results.len());
        let mut enrichment_failures = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(record) => enriched.push(record),
                Err(e) => {
                    log::warn!("Failed to enrich {}: {}", id, e);
                    enrichment_failures.push(RecordFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let persistence = self.writer.save_all(&enriched).await;
        for record in &enriched {
            if persistence.failures.iter().all(|f| f.id != record.id) {
                self.resolver
                    .prime(&card_cache_key(record.native_id), record, self.card_ttl_secs)
                    .await;
            }
        }

        let report = ImportReport {
            set_id,
            listed: cards.len(),
            enriched: enriched.len(),
            with_imagery: enriched.iter().filter(|r| r.imagery.is_some()).count(),
            enrichment_failures,
            persistence,
        };
        log::info!(
            "Imported set {}: {}/{} enriched, {} with imagery, {} saved",
            set_id,
            report.enriched,
            report.listed,
            report.with_imagery,
            report.persistence.saved
        );
        Ok(report)
    }

    /// Offline fix path: find imagery for stored cards of a set that have
    /// none, allowing the loose numeric-substring match.
    pub async fn repair_imagery(&self, set_id: i64) -> Result<RepairReport> {
        self.gate.check()?;
        let stored = with_timeout(
            self.store_timeout,
            "query partition",
            self.store.query_by_partition(set_id),
        )
        .await?;
        let missing: Vec<EntityRecord> = stored
            .into_iter()
            .filter(|r| r.is_card() && r.imagery.is_none())
            .collect();
        log::info!("Set {}: {} stored cards without imagery", set_id, missing.len());

        let scanned = missing.len();
        let mut repaired = Vec::new();
        let mut low_confidence = Vec::new();
        let mut unmatched = Vec::new();

        for mut record in missing {
            let Some(number) = record.number.clone() else {
                unmatched.push(record.id);
                continue;
            };

            let found = retry_with_backoff(&self.retry, "find secondary card", || {
                self.reconciler
                    .find_secondary_card(set_id, &number, MatchPolicy::Maintenance)
            })
            .await;

            match found {
                Ok(Some(found)) if found.card.images.is_some() => {
                    if found.tier.is_low_confidence() {
                        log::warn!(
                            "{} (#{}) matched {} via {} tier, review recommended",
                            record.id,
                            number,
                            found.card.id,
                            found.tier
                        );
                        low_confidence.push(record.id.clone());
                    }
                    apply_secondary(&mut record, &found.set_id, &found.card, found.tier);
                    record.updated_at = Utc::now();
                    repaired.push(record);
                }
                Ok(_) => unmatched.push(record.id),
                Err(e) => {
                    log::warn!("Lookup failed for {}: {}", record.id, e);
                    unmatched.push(record.id);
                }
            }
        }

        let persistence = self.writer.save_all(&repaired).await;
        for record in &repaired {
            self.resolver
                .invalidate(&card_cache_key(record.native_id))
                .await;
        }

        log::info!(
            "Repaired {}/{} cards in set {} ({} low confidence)",
            repaired.len(),
            scanned,
            set_id,
            low_confidence.len()
        );
        Ok(RepairReport {
            set_id,
            scanned,
            repaired: repaired.len(),
            low_confidence,
            unmatched,
            persistence,
        })
    }

    fn policy(&self, ttl_seconds: u64, force_refresh: bool) -> ResolvePolicy {
        if force_refresh {
            ResolvePolicy::refreshing(ttl_seconds)
        } else {
            ResolvePolicy::new(ttl_seconds)
        }
    }

    /// Store tier. A failing store is a miss; the source still answers.
    async fn lookup(&self, id: &str, partition: Option<i64>) -> Result<Option<EntityRecord>> {
        let Some(partition) = partition else {
            return Ok(None);
        };
        match with_timeout(
            self.store_timeout,
            "store lookup",
            self.store.get_by_key(id, partition),
        )
        .await
        {
            Ok(found) => Ok(found),
            Err(e) => {
                log::warn!("Store lookup failed for {}, falling through: {}", id, e);
                Ok(None)
            }
        }
    }

    async fn fetch_card(&self, native_id: i64) -> Result<Option<EntityRecord>> {
        self.gate.check()?;
        let detail = with_timeout(
            self.catalog_timeout,
            "card detail",
            self.primary.card_detail(native_id),
        )
        .await?;

        let Some(card) = detail else {
            return Ok(None);
        };
        let record = self
            .enricher
            .enrich(EntityRecord::from_primary_card(&card))
            .await?;
        Ok(Some(record))
    }

    async fn fetch_set(&self, native_id: i64) -> Result<Option<EntityRecord>> {
        self.gate.check()?;
        let sets = with_timeout(self.catalog_timeout, "list sets", self.primary.list_sets()).await?;

        let Some(set) = sets.iter().find(|s| s.id == native_id) else {
            return Ok(None);
        };
        let record = self
            .enricher
            .enrich_set(EntityRecord::from_primary_set(set))
            .await;
        Ok(Some(record))
    }

    /// Save a freshly fetched record. Handed to the resolver, which runs it
    /// detached with the cache write; failures are only logged.
    fn persist_task(&self, record: &EntityRecord) -> WriteBack {
        let writer = Arc::clone(&self.writer);
        let record = record.clone();
        Box::pin(async move {
            let outcome = writer.save_all(std::slice::from_ref(&record)).await;
            if outcome.failed > 0 {
                log::warn!("Resolved record was not persisted: {:?}", outcome.failures);
            }
        })
    }
}
