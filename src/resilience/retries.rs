//! Bounded retry-until-true.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::resilience::backoff::Backoff;

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }
}

/// Run `check` until it returns true or `ceiling` elapses.
///
/// The check always runs at least once. Sleeps never overshoot the ceiling.
pub async fn retry_until<F, Fut>(ceiling: Duration, mut backoff: Backoff, mut check: F) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + ceiling;
    let mut attempts = 0;

    loop {
        attempts += 1;
        if check().await {
            return WaitOutcome::Satisfied { attempts };
        }

        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut { attempts };
        }
        let delay = backoff.next_delay().min(deadline - now);
        sleep(delay).await;
    }
}
