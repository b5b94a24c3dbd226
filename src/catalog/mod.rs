//! External catalog clients
//!
//! Catalog A is the price tracker: integer ids, zero-padded card numbers,
//! metered by credits. Catalog B is the TCG API: string ids (`sv1-76`),
//! unpadded numbers, hosts card imagery.

mod price_tracker;
mod tcg_api;

pub use price_tracker::PriceTrackerClient;
pub use tcg_api::TcgApiClient;

use crate::error::Result;
use crate::pricing::RawPricing;
use crate::reconcile::Numbered;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Set as listed by the price tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimarySet {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub card_count: Option<u32>,
}

/// Card as listed by the price tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryCard {
    pub id: i64,
    pub set_id: i64,
    pub name: String,
    pub number: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub set_code: Option<String>,
}

/// Remaining credits on the metered account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredits {
    pub credits_remaining: i64,
    #[serde(default)]
    pub monthly_limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CardImages {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SetImages {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Set as listed by the TCG API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondarySet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub ptcgo_code: Option<String>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Option<SetImages>,
}

/// Set summary embedded in TCG API card responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryCardSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
}

/// Card as returned by the TCG API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryCard {
    pub id: String,
    pub name: String,
    pub number: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub images: Option<CardImages>,
    #[serde(default)]
    pub set: Option<SecondaryCardSet>,
}

impl Numbered for SecondaryCard {
    type Id = String;

    fn number(&self) -> &str {
        &self.number
    }

    fn native_id(&self) -> String {
        self.id.clone()
    }
}

/// Catalog A: cards, sets and the mandatory pricing data
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    async fn list_sets(&self) -> Result<Vec<PrimarySet>>;

    async fn list_cards(&self, set_id: i64) -> Result<Vec<PrimaryCard>>;

    /// `Ok(None)` when the catalog does not know the card
    async fn card_detail(&self, card_id: i64) -> Result<Option<PrimaryCard>>;

    async fn fetch_pricing(&self, card_id: i64) -> Result<RawPricing>;
}

/// Catalog B: secondary data (imagery, metadata)
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    async fn list_sets(&self) -> Result<Vec<SecondarySet>>;

    async fn list_cards(&self, set_id: &str) -> Result<Vec<SecondaryCard>>;

    /// `Ok(None)` when the catalog does not know the card
    async fn card_detail(&self, card_id: &str) -> Result<Option<SecondaryCard>>;
}

/// Side-channel credit endpoint of a metered catalog. Checking is free.
#[async_trait]
pub trait CreditSource: Send + Sync {
    async fn account_credits(&self) -> Result<AccountCredits>;
}

/// `{ "data": ... }` response wrapper used by both catalogs
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

pub(crate) const USER_AGENT: &str = "card_resolver/0.1";

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
