//! Catalog A behind the quota gate

use super::QuotaGate;
use crate::catalog::{PriceCatalog, PrimaryCard, PrimarySet};
use crate::error::Result;
use crate::pricing::RawPricing;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps the metered catalog. Calls fail with `QuotaExhausted` without
/// reaching the catalog while the gate is tripped, and a `QuotaExhausted`
/// answer from the catalog trips it.
pub struct GatedPriceCatalog {
    inner: Arc<dyn PriceCatalog>,
    gate: Arc<QuotaGate>,
}

impl GatedPriceCatalog {
    pub fn new(inner: Arc<dyn PriceCatalog>, gate: Arc<QuotaGate>) -> Self {
        Self { inner, gate }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        self.gate.record_result(&result);
        result
    }
}

#[async_trait]
impl PriceCatalog for GatedPriceCatalog {
    async fn list_sets(&self) -> Result<Vec<PrimarySet>> {
        self.gate.check()?;
        self.observe(self.inner.list_sets().await)
    }

    async fn list_cards(&self, set_id: i64) -> Result<Vec<PrimaryCard>> {
        self.gate.check()?;
        self.observe(self.inner.list_cards(set_id).await)
    }

    async fn card_detail(&self, card_id: i64) -> Result<Option<PrimaryCard>> {
        self.gate.check()?;
        self.observe(self.inner.card_detail(card_id).await)
    }

    async fn fetch_pricing(&self, card_id: i64) -> Result<RawPricing> {
        self.gate.check()?;
        self.observe(self.inner.fetch_pricing(card_id).await)
    }
}
