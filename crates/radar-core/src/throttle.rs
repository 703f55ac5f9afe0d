//! Reconciliation throttle.
//!
//! Limits how often streaming sessions hit the record source. A refresh
//! is due when nothing has been attempted yet, when the store is empty,
//! or when `min_interval` has elapsed since the last attempt.
//!
//! The throttle itself is plain data. [`TargetStore`] keeps it behind an
//! async mutex that is held across the whole check, fetch and reconcile
//! sequence, which is what makes the decision atomic.
//!
//! [`TargetStore`]: crate::store::TargetStore

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the last reconciliation attempt.
#[derive(Debug, Clone)]
pub struct ReloadThrottle {
    min_interval: Duration,
    last_attempt: Option<Instant>,
}

impl ReloadThrottle {
    /// Create a throttle that has never fired.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
        }
    }

    /// Minimum spacing between attempts.
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Instant of the last attempt, if any.
    pub const fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// Whether a refresh should run at `now`.
    pub fn is_due(&self, now: Instant, store_empty: bool) -> bool {
        if store_empty {
            return true;
        }
        self.last_attempt
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    /// Record an attempt at `now`.
    pub const fn mark(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}
