//! Set-level mapping between the two catalogs

use crate::catalog::{PrimarySet, SecondarySet};
use std::collections::{HashMap, HashSet};

/// Lowercase alphanumerics only (`"Scarlet & Violet—151"` → `"scarletviolet151"`)
pub fn normalize_set_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Precomputed lookups over both catalogs' set lists.
///
/// Each Catalog A set maps to at most one Catalog B set and no Catalog B set
/// is handed to two Catalog A sets. Name matches are settled before code
/// matches, so list order never lets a code match take a named set.
#[derive(Debug, Default)]
pub struct SetCatalogIndex {
    by_code: HashMap<String, i64>,
    by_name: HashMap<String, i64>,
    target_by_source: HashMap<i64, String>,
    primary: HashMap<i64, PrimarySet>,
    secondary: HashMap<String, SecondarySet>,
}

impl SetCatalogIndex {
    pub fn build(primary: &[PrimarySet], secondary: &[SecondarySet]) -> Self {
        let mut index = Self::default();
        let mut claimed: HashSet<&str> = HashSet::new();

        for set in primary {
            index
                .by_code
                .entry(set.code.to_lowercase())
                .or_insert(set.id);
            index
                .by_name
                .entry(normalize_set_name(&set.name))
                .or_insert(set.id);
        }

        // Name matches claim their sets before any code match is tried
        for set in primary {
            if index.target_by_source.contains_key(&set.id) {
                continue;
            }
            if let Some(target) = match_by_name(set, secondary, &claimed) {
                claimed.insert(target.id.as_str());
                index.target_by_source.insert(set.id, target.id.clone());
            }
        }

        for set in primary {
            if index.target_by_source.contains_key(&set.id) {
                continue;
            }
            if let Some(target) = match_by_code(set, secondary, &claimed) {
                claimed.insert(target.id.as_str());
                index.target_by_source.insert(set.id, target.id.clone());
            } else {
                log::debug!("No secondary set matches {} ({})", set.name, set.code);
            }
        }

        index.primary = primary.iter().map(|s| (s.id, s.clone())).collect();
        index.secondary = secondary.iter().map(|s| (s.id.clone(), s.clone())).collect();

        log::info!(
            "Built set index: {} primary sets, {} secondary sets, {} matched",
            index.primary.len(),
            index.secondary.len(),
            index.target_by_source.len()
        );
        index
    }

    /// Catalog A set id for a set code, case-insensitive
    pub fn source_set_id_by_code(&self, code: &str) -> Option<i64> {
        self.by_code.get(&code.to_lowercase()).copied()
    }

    /// Catalog A set id for a set name, ignoring case and punctuation
    pub fn source_set_id_by_name(&self, name: &str) -> Option<i64> {
        self.by_name.get(&normalize_set_name(name)).copied()
    }

    /// Catalog B set id reconciled for a Catalog A set id
    pub fn target_set_id(&self, source_set_id: i64) -> Option<&str> {
        self.target_by_source.get(&source_set_id).map(String::as_str)
    }

    pub fn primary_set(&self, id: i64) -> Option<&PrimarySet> {
        self.primary.get(&id)
    }

    pub fn secondary_set(&self, id: &str) -> Option<&SecondarySet> {
        self.secondary.get(id)
    }

    /// Number of reconciled set pairs
    pub fn matched_count(&self) -> usize {
        self.target_by_source.len()
    }

    /// Catalog A sets with no Catalog B counterpart, sorted by id
    pub fn unmatched_sources(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .primary
            .keys()
            .filter(|id| !self.target_by_source.contains_key(id))
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn is_unclaimed(candidate: &SecondarySet, claimed: &HashSet<&str>) -> bool {
    !claimed.contains(candidate.id.as_str())
}

fn match_by_name<'a>(
    set: &PrimarySet,
    secondary: &'a [SecondarySet],
    claimed: &HashSet<&str>,
) -> Option<&'a SecondarySet> {
    let name = normalize_set_name(&set.name);
    if name.is_empty() {
        return None;
    }
    secondary
        .iter()
        .find(|c| is_unclaimed(c, claimed) && normalize_set_name(&c.name) == name)
}

fn match_by_code<'a>(
    set: &PrimarySet,
    secondary: &'a [SecondarySet],
    claimed: &HashSet<&str>,
) -> Option<&'a SecondarySet> {
    let code = set.code.trim();
    if code.is_empty() {
        return None;
    }
    secondary.iter().find(|c| {
        is_unclaimed(c, claimed)
            && (c.id.eq_ignore_ascii_case(code)
                || c
                    .ptcgo_code
                    .as_deref()
                    .is_some_and(|ptcgo| ptcgo.eq_ignore_ascii_case(code)))
    })
}
