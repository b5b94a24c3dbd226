//! Tests for price normalization

use super::*;

fn raw(entries: &[(&str, Option<f64>)]) -> RawPricing {
    entries
        .iter()
        .map(|(label, value)| {
            (
                label.to_string(),
                RawPrice {
                    value: *value,
                    count: None,
                },
            )
        })
        .collect()
}

#[test]
fn test_grade_storage_key() {
    assert_eq!(grade_storage_key("10.0").as_deref(), Some("10"));
    assert_eq!(grade_storage_key("10").as_deref(), Some("10"));
    assert_eq!(grade_storage_key("8.5").as_deref(), Some("8_5"));
    assert_eq!(grade_storage_key("9.50").as_deref(), Some("9_5"));
    assert_eq!(grade_storage_key(" 7 ").as_deref(), Some("7"));
    assert_eq!(grade_storage_key("8.3"), None);
    assert_eq!(grade_storage_key("0"), None);
    assert_eq!(grade_storage_key("Gem Mint"), None);
}

#[test]
fn test_psa_ten_lands_in_ladder() {
    let pricing = normalize_pricing(&raw(&[("PSA 10.0", Some(120.0))]));
    let psa = pricing.psa_grades.as_ref().unwrap();
    assert_eq!(psa.get("10"), Some(&PricePoint::new(120.0)));
    assert!(pricing.cgc_grades.is_none());
}

#[test]
fn test_half_grade_key() {
    let pricing = normalize_pricing(&raw(&[("CGC 8.5", Some(40.0)), ("CGC 9.5", Some(80.0))]));
    let cgc = pricing.cgc_grades.unwrap();
    assert_eq!(cgc.get("8_5").map(|p| p.value), Some(40.0));
    assert_eq!(cgc.get("9_5").map(|p| p.value), Some(80.0));
}

#[test]
fn test_non_admissible_grade_dropped() {
    // PSA has no 9.5 grade
    let pricing = normalize_pricing(&raw(&[("PSA 9.5", Some(50.0))]));
    assert!(pricing.psa_grades.is_none());
    assert!(pricing.is_empty());
}

#[test]
fn test_all_zero_bucket_omitted() {
    let pricing = normalize_pricing(&raw(&[
        ("PSA 10", Some(0.0)),
        ("PSA 9", None),
        ("CGC 10", Some(15.0)),
    ]));
    assert!(pricing.psa_grades.is_none());
    assert_eq!(pricing.cgc_grades.unwrap().len(), 1);
}

#[test]
fn test_zero_members_dropped_not_stored() {
    let pricing = normalize_pricing(&raw(&[("PSA 10", Some(100.0)), ("PSA 9", Some(0.0))]));
    let psa = pricing.psa_grades.unwrap();
    assert_eq!(psa.len(), 1);
    assert!(psa.get("9").is_none());
}

#[test]
fn test_flat_sources() {
    let pricing = normalize_pricing(&raw(&[
        ("eBay Raw", Some(3.25)),
        ("TCGPlayer Market", Some(2.9)),
        ("Cardmarket Trend", Some(0.0)),
    ]));
    assert_eq!(pricing.ebay_raw.map(|p| p.value), Some(3.25));
    assert_eq!(pricing.tcgplayer_market.map(|p| p.value), Some(2.9));
    assert!(pricing.cardmarket_trend.is_none());
    assert_eq!(pricing.bucket_names(), vec!["ebayRaw", "tcgplayerMarket"]);
}

#[test]
fn test_negative_and_nan_dropped() {
    let pricing = normalize_pricing(&raw(&[("eBay Raw", Some(-1.0)), ("PSA 10", Some(f64::NAN))]));
    assert!(pricing.is_empty());
}

#[test]
fn test_unknown_labels_ignored() {
    let pricing = normalize_pricing(&raw(&[("BGS 10", Some(300.0)), ("Mystery", Some(1.0))]));
    assert!(pricing.is_empty());
}

#[test]
fn test_count_is_carried() {
    let mut input = RawPricing::new();
    input.insert(
        "PSA 9".to_string(),
        RawPrice {
            value: Some(45.0),
            count: Some(12),
        },
    );
    let pricing = normalize_pricing(&input);
    let point = pricing.psa_grades.unwrap()["9"];
    assert_eq!(point.count, Some(12));
}

#[test]
fn test_serialized_bucket_names() {
    let pricing = normalize_pricing(&raw(&[("PSA 10.0", Some(120.0)), ("CGC 8.5", Some(10.0))]));
    let json = serde_json::to_value(&pricing).unwrap();
    assert_eq!(json["psaGrades"]["10"]["value"], 120.0);
    assert_eq!(json["cgcGrades"]["8_5"]["value"], 10.0);
    assert!(json.get("ebayRaw").is_none());
}

#[test]
fn test_empty_pricing_serializes_as_object() {
    let json = serde_json::to_string(&Pricing::default()).unwrap();
    assert_eq!(json, "{}");
}
