//! Enrichment pipeline
//!
//! Pricing from Catalog A is mandatory: if it can't be fetched the record
//! can't be enriched. Imagery and metadata from Catalog B are optional: any
//! failure on that side is logged and the record comes back without them.

use crate::catalog::{ImageCatalog, PriceCatalog, SecondaryCard, SecondarySet};
use crate::error::{ResolverError, Result};
use crate::models::{EnrichmentMeta, EntityRecord, ImagePair, SetInfo};
use crate::pricing::normalize_pricing;
use crate::reconcile::{normalize_number, MatchTier, Reconciler, SecondaryMatch};
use crate::retry::{retry_with_backoff, with_timeout, RetryPolicy};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

pub struct Enricher {
    primary: Arc<dyn PriceCatalog>,
    secondary: Arc<dyn ImageCatalog>,
    reconciler: Arc<Reconciler>,
    timeout: Duration,
}

impl Enricher {
    pub fn new(
        primary: Arc<dyn PriceCatalog>,
        secondary: Arc<dyn ImageCatalog>,
        reconciler: Arc<Reconciler>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            reconciler,
            timeout,
        }
    }

    /// Attach pricing and, when available, Catalog B imagery and metadata.
    ///
    /// Only a pricing failure is returned as an error. Set records skip
    /// pricing and only pick up set imagery.
    pub async fn enrich(&self, mut record: EntityRecord) -> Result<EntityRecord> {
        if !record.is_card() {
            return Ok(self.enrich_set(record).await);
        }

        let raw = with_timeout(
            self.timeout,
            "fetch pricing",
            self.primary.fetch_pricing(record.native_id),
        )
        .await?;
        record.pricing = normalize_pricing(&raw);
        log::debug!("Priced {}: {:?}", record.id, record.pricing.bucket_names());

        match self.secondary_card(&record).await {
            Ok(Some(found)) => apply_secondary(&mut record, &found.set_id, &found.card, found.tier),
            Ok(None) => log::debug!("No secondary data for {}", record.id),
            Err(e) => log::warn!("Secondary enrichment failed for {}: {}", record.id, e),
        }

        record.updated_at = Utc::now();
        Ok(record)
    }

    /// Enrich records concurrently, at most `parallelism` at a time. Results
    /// keep the input order.
    pub async fn enrich_many(
        &self,
        records: Vec<EntityRecord>,
        parallelism: usize,
    ) -> Vec<Result<EntityRecord>> {
        self.enrich_all(records, parallelism, None).await
    }

    /// Bulk variant of [`Enricher::enrich_many`]: each record is retried with
    /// backoff under `policy`.
    pub async fn enrich_many_with_retry(
        &self,
        records: Vec<EntityRecord>,
        parallelism: usize,
        policy: &RetryPolicy,
    ) -> Vec<Result<EntityRecord>> {
        self.enrich_all(records, parallelism, Some(policy)).await
    }

    async fn enrich_all(
        &self,
        records: Vec<EntityRecord>,
        parallelism: usize,
        policy: Option<&RetryPolicy>,
    ) -> Vec<Result<EntityRecord>> {
        stream::iter(records)
            .map(|record| async move {
                match policy {
                    Some(policy) => {
                        let operation = format!("enrich {}", record.id);
                        retry_with_backoff(policy, &operation, || self.enrich(record.clone())).await
                    }
                    None => self.enrich(record).await,
                }
            })
            .buffered(parallelism.max(1))
            .collect()
            .await
    }

    /// Attach the reconciled Catalog B set's logo and symbol. Never fails.
    pub async fn enrich_set(&self, mut record: EntityRecord) -> EntityRecord {
        match self.secondary_set(record.native_id).await {
            Ok(Some(set)) => apply_secondary_set(&mut record, &set),
            Ok(None) => log::debug!("No secondary set for {}", record.id),
            Err(e) => log::warn!("Secondary set lookup failed for {}: {}", record.id, e),
        }
        record.updated_at = Utc::now();
        record
    }

    /// Catalog B card addressed as `<setId>-<number without zero padding>`.
    /// An id Catalog B doesn't know is not searched for any further.
    async fn secondary_card(&self, record: &EntityRecord) -> Result<Option<SecondaryMatch>> {
        let Some(number) = record.number.as_deref() else {
            return Ok(None);
        };
        let Some(set_id) = self.reconciler.target_set_id(record.set_id).await? else {
            return Ok(None);
        };

        let normalized = normalize_number(number);
        let card_id = format!("{}-{}", set_id, normalized);
        let card = with_timeout(
            self.timeout,
            "secondary card detail",
            self.secondary.card_detail(&card_id),
        )
        .await?;

        Ok(card.map(|card| {
            let tier = if card.number == number {
                MatchTier::Exact
            } else {
                MatchTier::ZeroStripped
            };
            SecondaryMatch {
                set_id,
                card,
                tier,
            }
        }))
    }

    async fn secondary_set(&self, source_set_id: i64) -> Result<Option<SecondarySet>> {
        let index = self.reconciler.set_index().await?;
        let Some(target) = index.target_set_id(source_set_id) else {
            return Ok(None);
        };
        index
            .secondary_set(target)
            .cloned()
            .map(Some)
            .ok_or_else(|| ResolverError::Enrichment(format!("set {} missing from index", target)))
    }
}

/// Merge a matched Catalog B card into `record`.
///
/// Imagery is set only when the card has at least one image URL. Rarity is
/// filled in only if the record has none.
pub fn apply_secondary(
    record: &mut EntityRecord,
    secondary_set_id: &str,
    card: &SecondaryCard,
    tier: MatchTier,
) {
    let images = card.images.clone().unwrap_or_default();
    if let Some(pair) = image_pair(images.small, images.large) {
        record.imagery = Some(pair);
    }

    if record.rarity.is_none() {
        record.rarity = card.rarity.clone();
    }

    if let Some(card_set) = &card.set {
        let set = record.set.get_or_insert_with(|| SetInfo {
            name: card_set.name.clone(),
            ..SetInfo::default()
        });
        if set.series.is_none() {
            set.series = card_set.series.clone();
        }
    }

    record.enrichment_meta = Some(EnrichmentMeta {
        secondary_set_id: secondary_set_id.to_string(),
        secondary_card_id: Some(card.id.clone()),
        match_tier: tier,
        enriched_at: Utc::now(),
    });
}

fn apply_secondary_set(record: &mut EntityRecord, set: &SecondarySet) {
    let images = set.images.clone().unwrap_or_default();
    if let Some(pair) = image_pair(images.symbol, images.logo) {
        record.imagery = Some(pair);
    }

    if let Some(info) = record.set.as_mut() {
        if info.series.is_none() {
            info.series = set.series.clone();
        }
        if info.release_date.is_none() {
            info.release_date = set.release_date.clone();
        }
    }

    record.enrichment_meta = Some(EnrichmentMeta {
        secondary_set_id: set.id.clone(),
        secondary_card_id: None,
        match_tier: MatchTier::Exact,
        enriched_at: Utc::now(),
    });
}

/// Either URL stands in for a missing counterpart
fn image_pair(small: Option<String>, large: Option<String>) -> Option<ImagePair> {
    match (small, large) {
        (Some(small), Some(large)) => Some(ImagePair { small, large }),
        (Some(only), None) | (None, Some(only)) => Some(ImagePair {
            small: only.clone(),
            large: only,
        }),
        (None, None) => None,
    }
}
