//! Catalog-backed reconciliation with memoized set index and card lists

use super::{find_native_id, Match, MatchPolicy, MatchTier, SetCatalogIndex};
use crate::catalog::{ImageCatalog, PriceCatalog, SecondaryCard};
use crate::error::Result;
use crate::memo::{KeyedMemo, TtlMemo};
use crate::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;

/// A Catalog B card matched to a Catalog A record
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryMatch {
    /// Catalog B set the card belongs to
    pub set_id: String,
    pub card: SecondaryCard,
    pub tier: MatchTier,
}

pub struct Reconciler {
    primary: Arc<dyn PriceCatalog>,
    secondary: Arc<dyn ImageCatalog>,
    index: TtlMemo<SetCatalogIndex>,
    card_lists: KeyedMemo<String, Vec<SecondaryCard>>,
    timeout: Duration,
}

impl Reconciler {
    pub fn new(
        primary: Arc<dyn PriceCatalog>,
        secondary: Arc<dyn ImageCatalog>,
        memo_ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            index: TtlMemo::new(memo_ttl),
            card_lists: KeyedMemo::new(memo_ttl),
            timeout,
        }
    }

    /// The set index, built from both catalogs' set lists on first use
    pub async fn set_index(&self) -> Result<Arc<SetCatalogIndex>> {
        self.index
            .get_or_try_init(|| async {
                let (primary_sets, secondary_sets) = tokio::try_join!(
                    with_timeout(self.timeout, "list primary sets", self.primary.list_sets()),
                    with_timeout(self.timeout, "list secondary sets", self.secondary.list_sets()),
                )?;
                Ok(SetCatalogIndex::build(&primary_sets, &secondary_sets))
            })
            .await
    }

    /// Drop the memoized index and card lists
    pub fn refresh(&self) {
        self.index.invalidate();
        self.card_lists.clear();
        log::info!("Reconciliation caches cleared");
    }

    /// Catalog B set id for a Catalog A set id, if the sets reconcile
    pub async fn target_set_id(&self, source_set_id: i64) -> Result<Option<String>> {
        let index = self.set_index().await?;
        Ok(index.target_set_id(source_set_id).map(str::to_string))
    }

    /// Every Catalog B card of a Catalog B set
    pub async fn secondary_cards(&self, target_set_id: &str) -> Result<Arc<Vec<SecondaryCard>>> {
        let key = target_set_id.to_string();
        self.card_lists
            .get_or_try_init(&key, || async {
                let cards = with_timeout(
                    self.timeout,
                    "list secondary cards",
                    self.secondary.list_cards(target_set_id),
                )
                .await?;
                log::debug!("Loaded {} cards for set {}", cards.len(), target_set_id);
                Ok(cards)
            })
            .await
    }

    /// Scan the reconciled set's Catalog B cards for `number`.
    ///
    /// Returns `Ok(None)` when the set doesn't reconcile or nothing matches
    /// under `policy`.
    pub async fn find_secondary_card(
        &self,
        source_set_id: i64,
        number: &str,
        policy: MatchPolicy,
    ) -> Result<Option<SecondaryMatch>> {
        let Some(set_id) = self.target_set_id(source_set_id).await? else {
            log::debug!("Set {} has no secondary counterpart", source_set_id);
            return Ok(None);
        };

        let cards = self.secondary_cards(&set_id).await?;
        let Some(Match { id, tier }) = find_native_id(cards.as_slice(), number, policy) else {
            return Ok(None);
        };

        Ok(cards
            .iter()
            .find(|card| card.id == id)
            .map(|card| SecondaryMatch {
                set_id: set_id.clone(),
                card: card.clone(),
                tier,
            }))
    }
}
