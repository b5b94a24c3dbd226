use crate::error::{ResolverError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared switch consulted before every metered source call
#[derive(Debug, Default)]
pub struct QuotaGate {
    tripped: AtomicBool,
}

impl QuotaGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !self.tripped.load(Ordering::SeqCst)
    }

    /// `Err(QuotaExhausted)` while tripped
    pub fn check(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ResolverError::QuotaExhausted)
        }
    }

    pub fn trip(&self) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            log::error!("Quota gate tripped: source calls suspended");
        }
    }

    /// Trip on a `QuotaExhausted` answer from the metered source
    pub fn record_result<T>(&self, result: &Result<T>) {
        if matches!(result, Err(ResolverError::QuotaExhausted)) {
            self.trip();
        }
    }

    pub fn reset(&self) {
        if self.tripped.swap(false, Ordering::SeqCst) {
            log::info!("Quota gate reset: source calls resumed");
        }
    }
}
