use super::QuotaSample;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Recent consumption above this multiple of the trailing average is anomalous
pub const ANOMALY_FACTOR: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub recent_rate_per_hour: f64,
    pub baseline_rate_per_hour: f64,
    pub ratio: f64,
}

/// Compare the latest interval's consumption rate to the trailing average
/// over `history` (oldest first, not including `latest`).
///
/// Needs at least two historical samples. Credit increases count as zero
/// consumption. A zero baseline skips detection.
pub fn detect_anomaly(history: &[QuotaSample], latest: &QuotaSample) -> Option<Anomaly> {
    if history.len() < 2 {
        return None;
    }
    let first = history.first()?;
    let previous = history.last()?;

    let baseline_hours = hours_between(first.timestamp, previous.timestamp)?;
    let baseline_consumed: i64 = history
        .windows(2)
        .map(|pair| consumed(&pair[0], &pair[1]))
        .sum();
    let baseline_rate_per_hour = baseline_consumed as f64 / baseline_hours;
    if baseline_rate_per_hour <= 0.0 {
        return None;
    }

    let recent_hours = hours_between(previous.timestamp, latest.timestamp)?;
    let recent_rate_per_hour = consumed(previous, latest) as f64 / recent_hours;
    let ratio = recent_rate_per_hour / baseline_rate_per_hour;

    if ratio > ANOMALY_FACTOR {
        Some(Anomaly {
            recent_rate_per_hour,
            baseline_rate_per_hour,
            ratio,
        })
    } else {
        None
    }
}

fn consumed(earlier: &QuotaSample, later: &QuotaSample) -> i64 {
    (earlier.credits_remaining - later.credits_remaining).max(0)
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
    let hours = (to - from).num_milliseconds() as f64 / 3_600_000.0;
    (hours > 0.0).then_some(hours)
}
