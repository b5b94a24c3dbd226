//! Price tracker API client (Catalog A)

use super::{
    AccountCredits, CreditSource, DataEnvelope, PriceCatalog, PrimaryCard, PrimarySet, USER_AGENT,
};
use crate::error::{ResolverError, Result};
use crate::pricing::RawPricing;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct PriceTrackerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PriceTrackerClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// GET `path` and unwrap the data envelope. 404 maps to `Ok(None)`.
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("Price tracker request: {}", url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::PAYMENT_REQUIRED => return Err(ResolverError::QuotaExhausted),
            status if !status.is_success() => return Err(ResolverError::HttpStatus(status)),
            _ => {}
        }

        let body = response.bytes().await?;
        let envelope: DataEnvelope<T> = serde_json::from_slice(&body)?;
        Ok(Some(envelope.data))
    }

    /// Like `get_data` but a 404 is a source failure, not an absent entity
    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_data(path).await?.ok_or_else(|| {
            ResolverError::source_unavailable("price_tracker", format!("{} returned 404", path))
        })
    }
}

#[async_trait]
impl PriceCatalog for PriceTrackerClient {
    async fn list_sets(&self) -> Result<Vec<PrimarySet>> {
        let sets: Vec<PrimarySet> = self.get_required("/v2/sets").await?;
        log::info!("Fetched {} sets from price tracker", sets.len());
        Ok(sets)
    }

    async fn list_cards(&self, set_id: i64) -> Result<Vec<PrimaryCard>> {
        let cards: Vec<PrimaryCard> = self
            .get_data(&format!("/v2/sets/{}/cards", set_id))
            .await?
            .unwrap_or_default();
        log::info!("Fetched {} cards for price tracker set {}", cards.len(), set_id);
        Ok(cards)
    }

    async fn card_detail(&self, card_id: i64) -> Result<Option<PrimaryCard>> {
        self.get_data(&format!("/v2/cards/{}", card_id)).await
    }

    async fn fetch_pricing(&self, card_id: i64) -> Result<RawPricing> {
        self.get_data(&format!("/v2/cards/{}/prices", card_id))
            .await?
            .ok_or_else(|| ResolverError::NotFound(format!("prices for card {}", card_id)))
    }
}

#[async_trait]
impl CreditSource for PriceTrackerClient {
    async fn account_credits(&self) -> Result<AccountCredits> {
        self.get_required("/v2/account").await
    }
}
