//! Runtime configuration
//!
//! Defaults are usable for local runs; every value can be overridden through
//! `CARD_RESOLVER_*` environment variables.

use std::time::Duration;

/// Price tracker API (Catalog A) base URL
pub const PRICE_TRACKER_API_BASE: &str = "https://www.pokemonpricetracker.com/api";

/// TCG API (Catalog B) base URL
pub const TCG_API_BASE: &str = "https://api.pokemontcg.io";

/// Default envelope TTL for resolved cards (24 hours)
pub const DEFAULT_CARD_TTL_SECS: u64 = 24 * 60 * 60;

/// Default envelope TTL for resolved sets (7 days)
pub const DEFAULT_SET_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub price_tracker_base: String,
    pub price_tracker_api_key: Option<String>,
    pub tcg_api_base: String,
    pub tcg_api_key: Option<String>,
    /// Envelope TTL for card records
    pub card_ttl_secs: u64,
    /// Envelope TTL for set records
    pub set_ttl_secs: u64,
    /// How long the in-memory set index and card lists stay valid
    pub index_ttl: Duration,
    /// Budget for every external catalog call
    pub catalog_timeout: Duration,
    /// Budget for every cache/store call
    pub store_timeout: Duration,
    /// Monthly credit limit to assume when the account endpoint omits it
    pub assumed_monthly_credits: Option<i64>,
    /// How often the quota monitor samples credits
    pub quota_interval: Duration,
    /// Disables the cache tier entirely (every resolve goes to store/source)
    pub cache_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            price_tracker_base: PRICE_TRACKER_API_BASE.to_string(),
            price_tracker_api_key: None,
            tcg_api_base: TCG_API_BASE.to_string(),
            tcg_api_key: None,
            card_ttl_secs: DEFAULT_CARD_TTL_SECS,
            set_ttl_secs: DEFAULT_SET_TTL_SECS,
            index_ttl: Duration::from_secs(6 * 60 * 60),
            catalog_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
            assumed_monthly_credits: Some(20_000),
            quota_interval: Duration::from_secs(6 * 60 * 60),
            cache_enabled: true,
        }
    }
}

impl Config {
    /// Build from defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            price_tracker_base: env_string("CARD_RESOLVER_PRICE_TRACKER_URL")
                .unwrap_or(defaults.price_tracker_base),
            price_tracker_api_key: env_string("CARD_RESOLVER_PRICE_TRACKER_KEY"),
            tcg_api_base: env_string("CARD_RESOLVER_TCG_API_URL").unwrap_or(defaults.tcg_api_base),
            tcg_api_key: env_string("CARD_RESOLVER_TCG_API_KEY"),
            card_ttl_secs: env_parse("CARD_RESOLVER_CARD_TTL_SECS").unwrap_or(defaults.card_ttl_secs),
            set_ttl_secs: env_parse("CARD_RESOLVER_SET_TTL_SECS").unwrap_or(defaults.set_ttl_secs),
            index_ttl: env_parse("CARD_RESOLVER_INDEX_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.index_ttl),
            catalog_timeout: env_parse("CARD_RESOLVER_CATALOG_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.catalog_timeout),
            store_timeout: env_parse("CARD_RESOLVER_STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            assumed_monthly_credits: env_parse("CARD_RESOLVER_MONTHLY_CREDITS")
                .or(defaults.assumed_monthly_credits),
            quota_interval: env_parse("CARD_RESOLVER_QUOTA_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.quota_interval),
            cache_enabled: std::env::var("CARD_RESOLVER_CACHE_ENABLED")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(defaults.cache_enabled),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
