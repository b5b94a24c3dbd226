//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use card_resolver::cache::{CacheTier, MemoryCache};
use card_resolver::catalog::{
    AccountCredits, CardImages, CreditSource, ImageCatalog, PriceCatalog, PrimaryCard, PrimarySet,
    SecondaryCard, SecondaryCardSet, SecondarySet, SetImages,
};
use card_resolver::models::EntityRecord;
use card_resolver::pricing::{RawPrice, RawPricing};
use card_resolver::quota::QuotaGate;
use card_resolver::retry::RetryPolicy;
use card_resolver::store::{MemoryStore, PersistentStore};
use card_resolver::{Collaborators, Config, ResolutionService, ResolverError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Catalog A ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePriceCatalog {
    pub sets: Vec<PrimarySet>,
    pub cards: Vec<PrimaryCard>,
    pub pricing: HashMap<i64, RawPricing>,
    /// Card ids whose pricing call fails
    pub failing_pricing: HashSet<i64>,
    /// Every pricing call answers `QuotaExhausted`
    pub exhausted: bool,
    pub set_list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub pricing_calls: AtomicUsize,
}

impl FakePriceCatalog {
    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn pricing_calls(&self) -> usize {
        self.pricing_calls.load(Ordering::SeqCst)
    }

    pub fn set_list_calls(&self) -> usize {
        self.set_list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceCatalog for FakePriceCatalog {
    async fn list_sets(&self) -> Result<Vec<PrimarySet>> {
        self.set_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sets.clone())
    }

    async fn list_cards(&self, set_id: i64) -> Result<Vec<PrimaryCard>> {
        Ok(self
            .cards
            .iter()
            .filter(|c| c.set_id == set_id)
            .cloned()
            .collect())
    }

    async fn card_detail(&self, card_id: i64) -> Result<Option<PrimaryCard>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cards.iter().find(|c| c.id == card_id).cloned())
    }

    async fn fetch_pricing(&self, card_id: i64) -> Result<RawPricing> {
        self.pricing_calls.fetch_add(1, Ordering::SeqCst);
        if self.exhausted {
            return Err(ResolverError::QuotaExhausted);
        }
        if self.failing_pricing.contains(&card_id) {
            return Err(ResolverError::source_unavailable("ppt", "pricing endpoint down"));
        }
        Ok(self.pricing.get(&card_id).cloned().unwrap_or_default())
    }
}

// ── Catalog B ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeImageCatalog {
    pub sets: Vec<SecondarySet>,
    pub cards: Vec<SecondaryCard>,
    /// Every call fails when set
    pub unavailable: bool,
    pub list_card_calls: AtomicUsize,
}

impl FakeImageCatalog {
    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(ResolverError::source_unavailable("tcg", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ImageCatalog for FakeImageCatalog {
    async fn list_sets(&self) -> Result<Vec<SecondarySet>> {
        self.check()?;
        Ok(self.sets.clone())
    }

    async fn list_cards(&self, set_id: &str) -> Result<Vec<SecondaryCard>> {
        self.check()?;
        self.list_card_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .cards
            .iter()
            .filter(|c| c.set.as_ref().is_some_and(|s| s.id == set_id))
            .cloned()
            .collect())
    }

    async fn card_detail(&self, card_id: &str) -> Result<Option<SecondaryCard>> {
        self.check()?;
        Ok(self.cards.iter().find(|c| c.id == card_id).cloned())
    }
}

// ── Credits ──────────────────────────────────────────────────────────

/// Hands out queued readings in order; fails once the queue is empty
#[derive(Default)]
pub struct FakeCredits {
    readings: Mutex<VecDeque<AccountCredits>>,
}

impl FakeCredits {
    pub fn with_readings(readings: &[i64], limit: Option<i64>) -> Self {
        Self {
            readings: Mutex::new(
                readings
                    .iter()
                    .map(|&credits_remaining| AccountCredits {
                        credits_remaining,
                        monthly_limit: limit,
                    })
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl CreditSource for FakeCredits {
    async fn account_credits(&self) -> Result<AccountCredits> {
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ResolverError::source_unavailable("ppt", "account endpoint down"))
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// Memory store whose upserts fail for selected ids
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_ids: HashSet<String>,
}

impl FailingStore {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait]
impl PersistentStore for FailingStore {
    async fn get_by_key(&self, id: &str, partition_key: i64) -> Result<Option<EntityRecord>> {
        self.inner.get_by_key(id, partition_key).await
    }

    async fn query_by_partition(&self, partition_key: i64) -> Result<Vec<EntityRecord>> {
        self.inner.query_by_partition(partition_key).await
    }

    async fn upsert(&self, record: &EntityRecord) -> Result<f64> {
        if self.fail_ids.contains(&record.id) {
            return Err(ResolverError::Persistence(format!("write rejected for {}", record.id)));
        }
        self.inner.upsert(record).await
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub const SET_ID: i64 = 501;
pub const AMARYS_ID: i64 = 73092;

pub fn primary_set() -> PrimarySet {
    PrimarySet {
        id: SET_ID,
        code: "TWM".to_string(),
        name: "Twilight Masquerade".to_string(),
        series: Some("Scarlet & Violet".to_string()),
        release_date: Some("2024-05-24".to_string()),
        card_count: Some(226),
    }
}

pub fn secondary_set() -> SecondarySet {
    SecondarySet {
        id: "sv6".to_string(),
        name: "Twilight Masquerade".to_string(),
        series: Some("Scarlet & Violet".to_string()),
        ptcgo_code: Some("TWM".to_string()),
        total: Some(226),
        release_date: Some("2024/05/24".to_string()),
        images: Some(SetImages {
            symbol: Some("https://images.pokemontcg.io/sv6/symbol.png".to_string()),
            logo: Some("https://images.pokemontcg.io/sv6/logo.png".to_string()),
        }),
    }
}

pub fn primary_card(id: i64, name: &str, number: &str) -> PrimaryCard {
    PrimaryCard {
        id,
        set_id: SET_ID,
        name: name.to_string(),
        number: number.to_string(),
        rarity: None,
        set_name: Some("Twilight Masquerade".to_string()),
        set_code: Some("TWM".to_string()),
    }
}

pub fn secondary_card(number: &str) -> SecondaryCard {
    SecondaryCard {
        id: format!("sv6-{}", number),
        name: format!("Card {}", number),
        number: number.to_string(),
        rarity: Some("Uncommon".to_string()),
        images: Some(CardImages {
            small: Some(format!("https://images.pokemontcg.io/sv6/{}.png", number)),
            large: Some(format!("https://images.pokemontcg.io/sv6/{}_hires.png", number)),
        }),
        set: Some(SecondaryCardSet {
            id: "sv6".to_string(),
            name: "Twilight Masquerade".to_string(),
            series: Some("Scarlet & Violet".to_string()),
        }),
    }
}

pub fn psa_pricing(grade: &str, value: f64) -> RawPricing {
    let mut pricing = RawPricing::new();
    pricing.insert(format!("PSA {}", grade), RawPrice::new(value));
    pricing
}

/// Catalog A with the Amarys card priced at PSA 10 = 120
pub fn amarys_catalog() -> FakePriceCatalog {
    let mut catalog = FakePriceCatalog {
        sets: vec![primary_set()],
        cards: vec![primary_card(AMARYS_ID, "Amarys", "076")],
        ..FakePriceCatalog::default()
    };
    catalog.pricing.insert(AMARYS_ID, psa_pricing("10.0", 120.0));
    catalog
}

/// Catalog B knowing the Amarys card as `sv6-76`
pub fn amarys_images() -> FakeImageCatalog {
    FakeImageCatalog {
        sets: vec![secondary_set()],
        cards: vec![secondary_card("76")],
        ..FakeImageCatalog::default()
    }
}

pub fn test_config() -> Config {
    Config {
        catalog_timeout: Duration::from_secs(2),
        store_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// Fast backoff so retry paths don't slow the tests down
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

pub struct Harness {
    pub service: ResolutionService,
    pub cache: Arc<MemoryCache>,
    pub gate: Arc<QuotaGate>,
}

pub fn harness(
    primary: Arc<FakePriceCatalog>,
    secondary: Arc<FakeImageCatalog>,
    store: Arc<dyn PersistentStore>,
) -> Harness {
    let cache = Arc::new(MemoryCache::new());
    let gate = Arc::new(QuotaGate::new());
    let service = ResolutionService::new(
        Collaborators {
            cache: Some(cache.clone() as Arc<dyn CacheTier>),
            store,
            primary,
            secondary,
            gate: Arc::clone(&gate),
        },
        &test_config(),
    )
    .with_retry_policy(quick_retry());

    Harness {
        service,
        cache,
        gate,
    }
}
