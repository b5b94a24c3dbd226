//! Quota monitoring for the metered catalog
//!
//! Credits are sampled on a schedule, classified into a health level and
//! checked for anomalous consumption. An exhausted account trips the shared
//! [`QuotaGate`], which short-circuits source calls until credits recover.
//! An exhausted answer from the catalog itself trips it too, see
//! [`GatedPriceCatalog`].

mod anomaly;
mod gate;
mod gated;
mod monitor;

pub use anomaly::{detect_anomaly, Anomaly, ANOMALY_FACTOR};
pub use gate::QuotaGate;
pub use gated::GatedPriceCatalog;
pub use monitor::{QuotaMonitor, HISTORY_WINDOW_HOURS, MAX_SAMPLES};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// With no known limit, remaining credits at or below this are critical
pub const UNKNOWN_LIMIT_CRITICAL: i64 = 100;

/// With no known limit, remaining credits at or below this are a warning
pub const UNKNOWN_LIMIT_WARNING: i64 = 500;

const CRITICAL_RATIO: f64 = 0.10;
const WARNING_RATIO: f64 = 0.20;

/// Health levels, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaHealth {
    Healthy,
    Warning,
    Critical,
    Exhausted,
}

impl std::fmt::Display for QuotaHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaHealth::Healthy => write!(f, "healthy"),
            QuotaHealth::Warning => write!(f, "warning"),
            QuotaHealth::Critical => write!(f, "critical"),
            QuotaHealth::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Fraction of the limit still available, when the limit is known
pub fn remaining_ratio(credits_remaining: i64, limit: Option<i64>) -> Option<f64> {
    match limit {
        Some(limit) if limit > 0 => Some(credits_remaining as f64 / limit as f64),
        _ => None,
    }
}

/// Classify remaining credits. Never less severe for fewer credits.
pub fn classify(credits_remaining: i64, limit: Option<i64>) -> QuotaHealth {
    if credits_remaining <= 0 {
        return QuotaHealth::Exhausted;
    }

    match remaining_ratio(credits_remaining, limit) {
        Some(ratio) if ratio <= CRITICAL_RATIO => QuotaHealth::Critical,
        Some(ratio) if ratio <= WARNING_RATIO => QuotaHealth::Warning,
        Some(_) => QuotaHealth::Healthy,
        None if credits_remaining <= UNKNOWN_LIMIT_CRITICAL => QuotaHealth::Critical,
        None if credits_remaining <= UNKNOWN_LIMIT_WARNING => QuotaHealth::Warning,
        None => QuotaHealth::Healthy,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSample {
    pub timestamp: DateTime<Utc>,
    pub credits_remaining: i64,
    pub status: QuotaHealth,
}

/// Result of one credit check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub sample: QuotaSample,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Remaining credits as a percentage of the limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<Anomaly>,
    pub alerts: Vec<String>,
}

/// What the monitor observed on its last run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum QuotaEvent {
    Checked(QuotaStatus),
    #[serde(rename_all = "camelCase")]
    CheckFailed { at: DateTime<Utc>, error: String },
}

/// Plain-text advisories for a status
pub fn alerts_for(
    health: QuotaHealth,
    credits_remaining: i64,
    percentage: Option<f64>,
    anomaly: Option<&Anomaly>,
) -> Vec<String> {
    let mut alerts = Vec::new();
    let share = percentage
        .map(|p| format!(" ({:.1}% of limit)", p))
        .unwrap_or_default();

    match health {
        QuotaHealth::Healthy => {}
        QuotaHealth::Warning => alerts.push(format!(
            "Credits running low: {} remaining{}",
            credits_remaining, share
        )),
        QuotaHealth::Critical => alerts.push(format!(
            "Credits critically low: {} remaining{}",
            credits_remaining, share
        )),
        QuotaHealth::Exhausted => alerts.push(
            "Credits exhausted: source calls are suspended until the quota resets".to_string(),
        ),
    }

    if let Some(anomaly) = anomaly {
        alerts.push(format!(
            "Unusual consumption: {:.1} credits/hour, {:.1}x the trailing average of {:.1}",
            anomaly.recent_rate_per_hour, anomaly.ratio, anomaly.baseline_rate_per_hour
        ));
    }
    alerts
}
