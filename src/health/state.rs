//! Probe streak tracking (hysteresis).
//!
//! # Decisions
//! ```text
//! NORMAL → promotion due:   consecutive failures >= failure_threshold
//! FAILOVER → restore due:   consecutive successes >= recovery_threshold
//!                           and the primary has been up for the settle period
//! ```
//!
//! Counters reset only after a transition actually happens. A transition that
//! fails keeps its streak so the next tick retries it.

use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct TransitionGate {
    failure_threshold: u32,
    recovery_threshold: u32,
    settle: Duration,
    consecutive_failures: u32,
    consecutive_successes: u32,
    healthy_since: Option<Instant>,
}

/// Read-only view of the streaks for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Streaks {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

impl TransitionGate {
    pub fn new(failure_threshold: u32, recovery_threshold: u32, settle: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_threshold: recovery_threshold.max(1),
            settle,
            consecutive_failures: 0,
            consecutive_successes: 0,
            healthy_since: None,
        }
    }

    /// Record one probe outcome.
    pub fn observe(&mut self, healthy: bool, now: Instant) {
        if healthy {
            self.consecutive_failures = 0;
            if self.consecutive_successes == 0 {
                self.healthy_since = Some(now);
            }
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        } else {
            self.consecutive_successes = 0;
            self.healthy_since = None;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }

    pub fn promotion_due(&self) -> bool {
        self.consecutive_failures >= self.failure_threshold
    }

    pub fn restore_due(&self, now: Instant) -> bool {
        if self.consecutive_successes < self.recovery_threshold {
            return false;
        }
        match self.healthy_since {
            Some(since) => now.saturating_duration_since(since) >= self.settle,
            None => false,
        }
    }

    /// Clear streaks after a completed transition.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.healthy_since = None;
    }

    pub fn streaks(&self) -> Streaks {
        Streaks {
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
        }
    }
}
