//! Scheduled credit sampling

use super::{alerts_for, classify, detect_anomaly, remaining_ratio, QuotaEvent, QuotaGate};
use super::{QuotaHealth, QuotaSample, QuotaStatus};
use crate::catalog::{AccountCredits, CreditSource};
use crate::error::Result;
use crate::retry::with_timeout;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Samples older than this many hours are dropped from the rolling window
pub const HISTORY_WINDOW_HOURS: i64 = 24;

/// Upper bound on retained samples
pub const MAX_SAMPLES: usize = 96;

pub struct QuotaMonitor {
    source: Arc<dyn CreditSource>,
    gate: Arc<QuotaGate>,
    /// Used when the account endpoint doesn't report a limit
    assumed_limit: Option<i64>,
    timeout: Duration,
    history: Mutex<VecDeque<QuotaSample>>,
    latest: RwLock<Option<QuotaEvent>>,
}

impl QuotaMonitor {
    pub fn new(
        source: Arc<dyn CreditSource>,
        gate: Arc<QuotaGate>,
        assumed_limit: Option<i64>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            gate,
            assumed_limit,
            timeout,
            history: Mutex::new(VecDeque::new()),
            latest: RwLock::new(None),
        }
    }

    pub fn gate(&self) -> &Arc<QuotaGate> {
        &self.gate
    }

    /// Check credits now. A failed check is recorded as a `CheckFailed`
    /// event and leaves the gate untouched.
    pub async fn sample(&self) -> Result<QuotaStatus> {
        match with_timeout(self.timeout, "account credits", self.source.account_credits()).await {
            Ok(credits) => Ok(self.record_at(Utc::now(), credits).await),
            Err(e) => {
                log::error!("Quota check failed: {}", e);
                *self.latest.write().await = Some(QuotaEvent::CheckFailed {
                    at: Utc::now(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Fold a credit reading taken at `at` into the window and classify it
    pub async fn record_at(&self, at: DateTime<Utc>, credits: AccountCredits) -> QuotaStatus {
        let limit = credits.monthly_limit.or(self.assumed_limit);
        let health = classify(credits.credits_remaining, limit);
        let sample = QuotaSample {
            timestamp: at,
            credits_remaining: credits.credits_remaining,
            status: health,
        };

        let anomaly = {
            let mut history = self.history.lock().await;
            let cutoff = at - chrono::Duration::hours(HISTORY_WINDOW_HOURS);
            while history.front().is_some_and(|s| s.timestamp < cutoff) {
                history.pop_front();
            }

            let anomaly = detect_anomaly(history.make_contiguous(), &sample);
            history.push_back(sample.clone());
            while history.len() > MAX_SAMPLES {
                history.pop_front();
            }
            anomaly
        };

        let percentage = remaining_ratio(credits.credits_remaining, limit).map(|r| r * 100.0);
        let alerts = alerts_for(health, credits.credits_remaining, percentage, anomaly.as_ref());
        let status = QuotaStatus {
            sample,
            limit,
            percentage,
            anomaly,
            alerts,
        };

        if health == QuotaHealth::Exhausted {
            self.gate.trip();
        } else {
            self.gate.reset();
        }
        log_status(&status);

        *self.latest.write().await = Some(QuotaEvent::Checked(status.clone()));
        status
    }

    /// Most recent event, if any check has run
    pub async fn latest(&self) -> Option<QuotaEvent> {
        self.latest.read().await.clone()
    }

    /// Samples currently in the window, oldest first
    pub async fn history(&self) -> Vec<QuotaSample> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Sample immediately, then every `interval`. Runs until the task is
    /// dropped.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        log::info!("Quota monitor running every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            log::debug!("Scheduled quota check triggered");
            // Failures are already recorded as CheckFailed events
            let _ = self.sample().await;
        }
    }
}

fn log_status(status: &QuotaStatus) {
    let remaining = status.sample.credits_remaining;
    match status.sample.status {
        QuotaHealth::Healthy => log::info!("Quota healthy: {} credits remaining", remaining),
        QuotaHealth::Warning => log::warn!("Quota warning: {} credits remaining", remaining),
        QuotaHealth::Critical | QuotaHealth::Exhausted => log::error!(
            "Quota {}: {} credits remaining",
            status.sample.status,
            remaining
        ),
    }
    for alert in &status.alerts {
        log::warn!("Quota alert: {}", alert);
    }
}
