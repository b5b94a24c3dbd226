//! Record shapes shared by the resolver, the store and the catalogs
//!
//! These are persisted as JSON documents and cached inside envelopes, so the
//! serialized field names are a compatibility contract with existing data.

use crate::catalog::{PrimaryCard, PrimarySet};
use crate::error::{ResolverError, Result};
use crate::pricing::Pricing;
use crate::reconcile::MatchTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source prefix used in canonical ids of price tracker entities
pub const CANONICAL_SOURCE: &str = "ppt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Card,
    Set,
}

/// Set metadata carried on card records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

/// Small/large image URL pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePair {
    pub small: String,
    pub large: String,
}

/// Which secondary catalog entity a record was matched to, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentMeta {
    pub secondary_set_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_card_id: Option<String>,
    pub match_tier: MatchTier,
    pub enriched_at: DateTime<Utc>,
}

/// A card or set record as stored and returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    /// Canonical id, `"<source>-<nativeId>"`
    pub id: String,
    pub native_id: i64,
    /// Partition key. For sets this is the set's own native id.
    pub set_id: i64,
    pub kind: EntityKind,
    pub name: String,
    /// Number within the set, verbatim from the source (may be zero-padded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<SetInfo>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagery: Option<ImagePair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_meta: Option<EnrichmentMeta>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    /// New card record with empty pricing and no secondary data
    pub fn card(native_id: i64, set_id: i64, name: &str, number: &str) -> Self {
        Self {
            id: canonical_id(native_id),
            native_id,
            set_id,
            kind: EntityKind::Card,
            name: name.to_string(),
            number: Some(number.to_string()),
            rarity: None,
            set: None,
            pricing: Pricing::default(),
            imagery: None,
            enrichment_meta: None,
            updated_at: Utc::now(),
        }
    }

    /// New set record, partitioned by its own id
    pub fn set(native_id: i64, name: &str) -> Self {
        Self {
            id: canonical_id(native_id),
            native_id,
            set_id: native_id,
            kind: EntityKind::Set,
            name: name.to_string(),
            number: None,
            rarity: None,
            set: None,
            pricing: Pricing::default(),
            imagery: None,
            enrichment_meta: None,
            updated_at: Utc::now(),
        }
    }

    pub fn from_primary_card(card: &PrimaryCard) -> Self {
        let mut record = Self::card(card.id, card.set_id, &card.name, &card.number);
        record.rarity = card.rarity.clone();
        if let Some(set_name) = &card.set_name {
            record.set = Some(SetInfo {
                name: set_name.clone(),
                code: card.set_code.clone(),
                series: None,
                release_date: None,
            });
        }
        record
    }

    pub fn from_primary_set(set: &PrimarySet) -> Self {
        let mut record = Self::set(set.id, &set.name);
        record.set = Some(SetInfo {
            name: set.name.clone(),
            code: Some(set.code.clone()),
            series: set.series.clone(),
            release_date: set.release_date.clone(),
        });
        record
    }

    pub fn is_card(&self) -> bool {
        self.kind == EntityKind::Card
    }
}

/// Compose the canonical id for a price tracker native id
pub fn canonical_id(native_id: i64) -> String {
    format!("{}-{}", CANONICAL_SOURCE, native_id)
}

/// Cache key for a card envelope
pub fn card_cache_key(native_id: i64) -> String {
    format!("card-{}", native_id)
}

/// Cache key for a set envelope
pub fn set_cache_key(native_id: i64) -> String {
    format!("set-{}", native_id)
}

/// Parse an entity id as sent by callers.
///
/// Accepts a canonical id (`ppt-73092`), a cache-style key (`card-73092`,
/// `set-12`) or a bare native id (`73092`).
pub fn parse_native_id(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let digits = match trimmed.rsplit_once('-') {
        Some((prefix, digits))
            if prefix.eq_ignore_ascii_case(CANONICAL_SOURCE)
                || prefix.eq_ignore_ascii_case("card")
                || prefix.eq_ignore_ascii_case("set") =>
        {
            digits
        }
        Some(_) => return Err(ResolverError::InvalidId(raw.to_string())),
        None => trimmed,
    };

    match digits.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ResolverError::InvalidId(raw.to_string())),
    }
}
