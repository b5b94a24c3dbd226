//! Price normalization
//!
//! The price tracker returns a flat map of labels (`"PSA 10.0"`, `"CGC 9.5"`,
//! `"eBay Raw"`, ...) to values. Stored records carry those prices as buckets:
//! two grade ladders keyed by storage grade key, plus a few flat sources.
//! A bucket exists only if at least one of its members is strictly positive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw price entry as returned by the price tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RawPrice {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub count: Option<u32>,
}

impl RawPrice {
    pub fn new(value: f64) -> Self {
        Self {
            value: Some(value),
            count: None,
        }
    }
}

/// Label → raw price, verbatim from the price tracker
pub type RawPricing = BTreeMap<String, RawPrice>;

/// A single normalized price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl PricePoint {
    pub fn new(value: f64) -> Self {
        Self { value, count: None }
    }
}

/// Storage grade key → price
pub type GradeLadder = BTreeMap<String, PricePoint>;

/// Normalized price buckets stored on a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psa_grades: Option<GradeLadder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgc_grades: Option<GradeLadder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebay_raw: Option<PricePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcgplayer_market: Option<PricePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardmarket_trend: Option<PricePoint>,
}

impl Pricing {
    pub fn is_empty(&self) -> bool {
        self.psa_grades.is_none()
            && self.cgc_grades.is_none()
            && self.ebay_raw.is_none()
            && self.tcgplayer_market.is_none()
            && self.cardmarket_trend.is_none()
    }

    /// Names of the buckets present, in storage naming
    pub fn bucket_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.psa_grades.is_some() {
            names.push("psaGrades");
        }
        if self.cgc_grades.is_some() {
            names.push("cgcGrades");
        }
        if self.ebay_raw.is_some() {
            names.push("ebayRaw");
        }
        if self.tcgplayer_market.is_some() {
            names.push("tcgplayerMarket");
        }
        if self.cardmarket_trend.is_some() {
            names.push("cardmarketTrend");
        }
        names
    }
}

/// Grading scales with a fixed set of admissible grades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeScale {
    Psa,
    Cgc,
}

const PSA_GRADES: &[&str] = &[
    "10", "9", "8_5", "8", "7_5", "7", "6_5", "6", "5_5", "5", "4_5", "4", "3_5", "3", "2_5", "2",
    "1_5", "1",
];

const CGC_GRADES: &[&str] = &[
    "10", "9_5", "9", "8_5", "8", "7_5", "7", "6_5", "6", "5_5", "5", "4_5", "4", "3_5", "3",
    "2_5", "2", "1_5", "1",
];

impl GradeScale {
    fn prefix(self) -> &'static str {
        match self {
            GradeScale::Psa => "PSA",
            GradeScale::Cgc => "CGC",
        }
    }

    /// Storage keys accepted on this scale
    pub fn admissible_keys(self) -> &'static [&'static str] {
        match self {
            GradeScale::Psa => PSA_GRADES,
            GradeScale::Cgc => CGC_GRADES,
        }
    }

    pub fn admits(self, storage_key: &str) -> bool {
        self.admissible_keys().contains(&storage_key)
    }
}

/// Convert a grade label to its storage key: `"10.0"` → `"10"`, `"8.5"` → `"8_5"`.
///
/// Returns `None` for anything that is not a whole or half grade.
pub fn grade_storage_key(label: &str) -> Option<String> {
    let grade: f64 = label.trim().parse().ok()?;
    if !grade.is_finite() || grade <= 0.0 {
        return None;
    }
    let halves = grade * 2.0;
    if (halves - halves.round()).abs() > 1e-9 {
        return None;
    }
    let halves = halves.round() as i64;
    let whole = halves / 2;
    if halves % 2 == 0 {
        Some(whole.to_string())
    } else {
        Some(format!("{}_5", whole))
    }
}

/// Flat price sources a label can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlatSource {
    EbayRaw,
    TcgplayerMarket,
    CardmarketTrend,
}

fn flat_source(label: &str) -> Option<FlatSource> {
    match label.trim().to_lowercase().as_str() {
        "ebay raw" | "ungraded" | "raw" => Some(FlatSource::EbayRaw),
        "tcgplayer market" | "tcgplayer" | "market" => Some(FlatSource::TcgplayerMarket),
        "cardmarket trend" | "cardmarket" => Some(FlatSource::CardmarketTrend),
        _ => None,
    }
}

fn graded_label(label: &str) -> Option<(GradeScale, &str)> {
    let trimmed = label.trim();
    for scale in [GradeScale::Psa, GradeScale::Cgc] {
        let prefix = scale.prefix();
        let (Some(head), Some(rest)) = (trimmed.get(..prefix.len()), trimmed.get(prefix.len()..))
        else {
            continue;
        };
        if head.eq_ignore_ascii_case(prefix) && rest.starts_with(char::is_whitespace) {
            return Some((scale, rest.trim()));
        }
    }
    None
}

fn positive_point(raw: &RawPrice) -> Option<PricePoint> {
    match raw.value {
        Some(value) if value.is_finite() && value > 0.0 => Some(PricePoint {
            value,
            count: raw.count,
        }),
        _ => None,
    }
}

/// Normalize a raw price map into buckets.
///
/// Zero, negative and missing values are dropped. When two labels map to the
/// same storage key the first one in label order wins.
pub fn normalize_pricing(raw: &RawPricing) -> Pricing {
    let mut psa = GradeLadder::new();
    let mut cgc = GradeLadder::new();
    let mut pricing = Pricing::default();

    for (label, price) in raw {
        let Some(point) = positive_point(price) else {
            continue;
        };

        if let Some((scale, grade)) = graded_label(label) {
            match grade_storage_key(grade) {
                Some(key) if scale.admits(&key) => {
                    let ladder = match scale {
                        GradeScale::Psa => &mut psa,
                        GradeScale::Cgc => &mut cgc,
                    };
                    ladder.entry(key).or_insert(point);
                }
                _ => log::debug!("Dropping non-admissible grade label: {}", label),
            }
            continue;
        }

        match flat_source(label) {
            Some(FlatSource::EbayRaw) => {
                pricing.ebay_raw.get_or_insert(point);
            }
            Some(FlatSource::TcgplayerMarket) => {
                pricing.tcgplayer_market.get_or_insert(point);
            }
            Some(FlatSource::CardmarketTrend) => {
                pricing.cardmarket_trend.get_or_insert(point);
            }
            None => log::debug!("Dropping unknown price label: {}", label),
        }
    }

    if !psa.is_empty() {
        pricing.psa_grades = Some(psa);
    }
    if !cgc.is_empty() {
        pricing.cgc_grades = Some(cgc);
    }
    pricing
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
