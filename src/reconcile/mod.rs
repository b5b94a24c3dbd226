//! Cross-catalog reconciliation
//!
//! Catalog A numbers cards with zero padding (`"076"`), Catalog B does not
//! (`"76"`), and the two catalogs name sets differently. This module maps
//! sets through a precomputed [`SetCatalogIndex`] and cards through a tiered
//! number match that prefers exactness.

mod matching;
mod reconciler;
mod set_index;

pub use matching::{find_native_id, leading_digits, normalize_number};
pub use reconciler::{Reconciler, SecondaryMatch};
pub use set_index::{normalize_set_name, SetCatalogIndex};

use serde::{Deserialize, Serialize};

/// Which matching tier produced a card match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchTier {
    /// Numbers equal verbatim
    Exact,
    /// Target number equal after stripping leading zeros
    ZeroStripped,
    /// Candidate contains the target's leading digit run
    NumericSubstring,
}

impl MatchTier {
    /// Loose matches are only produced on the maintenance path and should be
    /// reviewed.
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, MatchTier::NumericSubstring)
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "exact"),
            MatchTier::ZeroStripped => write!(f, "zero-stripped"),
            MatchTier::NumericSubstring => write!(f, "numeric-substring"),
        }
    }
}

/// Which tiers a caller allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Request path: exact and zero-stripped only
    Online,
    /// Offline repair path: also allows the numeric-substring tier
    Maintenance,
}

impl MatchPolicy {
    pub fn allows(&self, tier: MatchTier) -> bool {
        match self {
            MatchPolicy::Online => tier != MatchTier::NumericSubstring,
            MatchPolicy::Maintenance => true,
        }
    }
}

/// Anything carrying a number within its set and a catalog-native id
pub trait Numbered {
    type Id: Clone;

    fn number(&self) -> &str;

    fn native_id(&self) -> Self::Id;
}

/// A matched candidate id and the tier that matched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<Id> {
    pub id: Id,
    pub tier: MatchTier,
}
