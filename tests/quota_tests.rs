//! Quota monitor: classification, anomaly detection and the gate.

mod common;

use card_resolver::catalog::AccountCredits;
use card_resolver::quota::{QuotaEvent, QuotaGate, QuotaHealth, QuotaMonitor, MAX_SAMPLES};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::FakeCredits;
use std::sync::Arc;
use std::time::Duration;

fn credits(remaining: i64, limit: Option<i64>) -> AccountCredits {
    AccountCredits {
        credits_remaining: remaining,
        monthly_limit: limit,
    }
}

fn monitor_with(source: FakeCredits, assumed_limit: Option<i64>) -> (QuotaMonitor, Arc<QuotaGate>) {
    let gate = Arc::new(QuotaGate::new());
    let monitor = QuotaMonitor::new(
        Arc::new(source),
        Arc::clone(&gate),
        assumed_limit,
        Duration::from_secs(1),
    );
    (monitor, gate)
}

#[tokio::test]
async fn sudden_burn_raises_anomaly() {
    let (monitor, _) = monitor_with(FakeCredits::default(), Some(20_000));
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    // Trailing average of 50 credits per 6h
    for (hours, remaining) in [(0, 1100), (6, 1050), (12, 1000)] {
        let status = monitor
            .record_at(start + ChronoDuration::hours(hours), credits(remaining, None))
            .await;
        assert!(status.anomaly.is_none());
    }

    // 600 credits gone in the next 6h interval
    let status = monitor
        .record_at(start + ChronoDuration::hours(18), credits(400, None))
        .await;

    let anomaly = status.anomaly.expect("anomaly expected");
    assert!(anomaly.ratio > 3.0);
    assert!(status.alerts.iter().any(|a| a.contains("Unusual consumption")));
    assert_eq!(status.sample.status, QuotaHealth::Critical);
    assert_eq!(status.limit, Some(20_000));
}

#[tokio::test]
async fn exhausted_trips_gate_and_recovery_resets_it() {
    let (monitor, gate) = monitor_with(
        FakeCredits::with_readings(&[0, 15_000], Some(20_000)),
        None,
    );

    let status = monitor.sample().await.unwrap();
    assert_eq!(status.sample.status, QuotaHealth::Exhausted);
    assert!(!gate.is_open());

    let status = monitor.sample().await.unwrap();
    assert_eq!(status.sample.status, QuotaHealth::Healthy);
    assert_eq!(status.percentage, Some(75.0));
    assert!(gate.is_open());
}

#[tokio::test]
async fn failed_check_is_a_distinct_event() {
    let (monitor, gate) = monitor_with(FakeCredits::default(), None);

    assert!(monitor.sample().await.is_err());
    assert!(matches!(
        monitor.latest().await,
        Some(QuotaEvent::CheckFailed { .. })
    ));
    // A failed check leaves the gate alone
    assert!(gate.is_open());
    assert!(monitor.history().await.is_empty());
}

#[tokio::test]
async fn unknown_limit_uses_absolute_thresholds() {
    let (monitor, _) = monitor_with(FakeCredits::with_readings(&[450], None), None);
    let status = monitor.sample().await.unwrap();

    assert_eq!(status.sample.status, QuotaHealth::Warning);
    assert!(status.percentage.is_none());
    assert_eq!(status.alerts.len(), 1);
}

#[tokio::test]
async fn window_drops_old_samples() {
    let (monitor, _) = monitor_with(FakeCredits::default(), Some(20_000));
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    monitor.record_at(start, credits(10_000, None)).await;
    monitor
        .record_at(start + ChronoDuration::hours(30), credits(9_000, None))
        .await;

    let history = monitor.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].credits_remaining, 9_000);
}

#[tokio::test]
async fn window_is_capped() {
    let (monitor, _) = monitor_with(FakeCredits::default(), Some(20_000));
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    for minute in 0..(MAX_SAMPLES as i64 + 20) {
        monitor
            .record_at(
                start + ChronoDuration::minutes(minute),
                credits(20_000 - minute, None),
            )
            .await;
    }
    assert_eq!(monitor.history().await.len(), MAX_SAMPLES);
}

#[tokio::test]
async fn latest_reports_last_check() {
    let (monitor, _) = monitor_with(FakeCredits::with_readings(&[12_000], Some(20_000)), None);
    assert!(monitor.latest().await.is_none());

    monitor.sample().await.unwrap();
    match monitor.latest().await {
        Some(QuotaEvent::Checked(status)) => assert_eq!(status.sample.credits_remaining, 12_000),
        other => panic!("unexpected event: {:?}", other),
    }
}
