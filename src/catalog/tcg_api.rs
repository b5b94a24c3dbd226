//! TCG API client (Catalog B)
//!
//! Card ids are `<setId>-<number>` with unpadded numbers.

use super::{DataEnvelope, ImageCatalog, SecondaryCard, SecondarySet, USER_AGENT};
use crate::error::{ResolverError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Largest page the API serves
const PAGE_SIZE: usize = 250;

/// Hard stop for pagination in case `totalCount` lies
const MAX_PAGES: usize = 20;

/// Paginated list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    total_count: Option<usize>,
}

pub struct TcgApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TcgApiClient {
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

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }

    async fn fetch_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("TCG API request: {} {:?}", url, query);

        let response = self.request(&url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(ResolverError::HttpStatus(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Walk all pages of a list endpoint
    async fn fetch_all<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        base_query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut query = base_query.to_vec();
            query.push(("page", page.to_string()));
            query.push(("pageSize", PAGE_SIZE.to_string()));

            let result: Page<T> = self.fetch_page(path, &query).await?;
            let fetched = result.data.len();
            items.extend(result.data);

            let total = result.total_count.unwrap_or(items.len());
            if fetched < PAGE_SIZE || items.len() >= total {
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl ImageCatalog for TcgApiClient {
    async fn list_sets(&self) -> Result<Vec<SecondarySet>> {
        let sets: Vec<SecondarySet> = self.fetch_all("/v2/sets", &[]).await?;
        log::info!("Fetched {} sets from TCG API", sets.len());
        Ok(sets)
    }

    async fn list_cards(&self, set_id: &str) -> Result<Vec<SecondaryCard>> {
        let query = [("q", format!("set.id:{}", set_id))];
        let cards: Vec<SecondaryCard> = self.fetch_all("/v2/cards", &query).await?;
        log::info!("Fetched {} cards for TCG API set {}", cards.len(), set_id);
        Ok(cards)
    }

    async fn card_detail(&self, card_id: &str) -> Result<Option<SecondaryCard>> {
        let url = format!(
            "{}/v2/cards/{}",
            self.base_url,
            urlencoding::encode(card_id)
        );
        log::debug!("TCG API request: {}", url);

        let response = self.request(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(ResolverError::HttpStatus(status)),
            _ => {
                let body = response.bytes().await?;
                let envelope: DataEnvelope<SecondaryCard> = serde_json::from_slice(&body)?;
                Ok(Some(envelope.data))
            }
        }
    }
}
