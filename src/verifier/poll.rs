//! Deadline-bounded polling for replicated row state.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self as time, sleep, Instant};

use crate::db::DbError;

/// Source of a row's payload on some endpoint.
#[async_trait]
pub trait RowReader: Send + Sync {
    /// `Ok(None)` when the row does not exist.
    async fn read_payload(&self, row_id: i32) -> Result<Option<String>, DbError>;

    /// Label for logs.
    fn source(&self) -> String;
}

/// The row state a caller is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Value(String),
    Absent,
}

impl Expectation {
    fn is_met(&self, observed: &Option<String>) -> bool {
        match (self, observed) {
            (Expectation::Value(want), Some(got)) => want == got,
            (Expectation::Absent, None) => true,
            _ => false,
        }
    }
}

/// Poll `reader` until `expect` holds or `timeout` elapses.
///
/// Query errors while polling count as "not converged yet"; only the deadline
/// produces `false`. Each read is itself cut off at the deadline, so a stalled
/// read cannot hold the caller past `timeout`.
pub async fn await_state(
    reader: &dyn RowReader,
    row_id: i32,
    expect: &Expectation,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut attempts: u32 = 0;
    let mut last_error: Option<String> = None;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        match time::timeout(remaining, reader.read_payload(row_id)).await {
            Ok(Ok(observed)) if expect.is_met(&observed) => {
                tracing::debug!(source = %reader.source(), row_id, attempts, "Converged");
                return true;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::debug!(source = %reader.source(), row_id, error = %e, "Poll read failed");
                last_error = Some(e.summary());
            }
            Err(_) => {
                tracing::debug!(source = %reader.source(), row_id, "Poll read still pending at deadline");
                last_error = Some("read stalled".to_string());
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                source = %reader.source(),
                row_id,
                attempts,
                expected = ?expect,
                last_error = last_error.as_deref().unwrap_or("none"),
                "Convergence deadline elapsed"
            );
            return false;
        }
        sleep(interval.min(deadline - now)).await;
    }
}
