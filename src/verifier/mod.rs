//! Replication convergence verifier.
//!
//! # Data Flow
//! ```text
//! write on primary (table.rs)
//!     → await_value / await_absence on replica (poll.rs)
//!     → bool (deadline decides failure)
//!
//! write-rejection check (rejection.rs)
//!     → INSERT / UPDATE / DELETE on replica, each rolled back
//!     → every statement must be refused as read-only (SQLSTATE 25006)
//! ```
//!
//! # Design Decisions
//! - Each call opens its own connections; safe to run from many tasks at once
//! - Transient errors while polling mean "not yet", never "failed"
//! - Callers get a bool plus a log line, not an error

pub mod poll;
pub mod rejection;
pub mod table;

use std::time::Duration;

use crate::config::ConvergenceConfig;
use crate::db::Endpoint;

pub use poll::{await_state, Expectation, RowReader};
pub use rejection::{check_write_rejected, AttemptOutcome, RejectionReport, WriteAttempt};
pub use table::{ScenarioTable, WriteProbe};

/// Entry point for convergence checks against a configured table.
#[derive(Debug, Clone)]
pub struct ConvergenceVerifier {
    table: String,
    poll_interval: Duration,
    op_timeout: Duration,
}

impl ConvergenceVerifier {
    pub fn new(config: &ConvergenceConfig, op_timeout: Duration) -> Self {
        Self {
            table: config.table.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            op_timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn table_on(&self, endpoint: &Endpoint) -> ScenarioTable {
        ScenarioTable::new(endpoint.clone(), self.table.clone(), self.op_timeout)
    }

    /// Wait until `row_id` on `endpoint` carries `expected`.
    pub async fn await_value(
        &self,
        endpoint: &Endpoint,
        row_id: i32,
        expected: &str,
        timeout: Duration,
    ) -> bool {
        let reader = self.table_on(endpoint);
        await_state(
            &reader,
            row_id,
            &Expectation::Value(expected.to_string()),
            timeout,
            self.poll_interval,
        )
        .await
    }

    /// Wait until `row_id` no longer exists on `endpoint`.
    pub async fn await_absence(&self, endpoint: &Endpoint, row_id: i32, timeout: Duration) -> bool {
        let reader = self.table_on(endpoint);
        await_state(&reader, row_id, &Expectation::Absent, timeout, self.poll_interval).await
    }

    /// True when `endpoint` refuses INSERT, UPDATE and DELETE.
    pub async fn check_write_rejected(&self, endpoint: &Endpoint) -> bool {
        check_write_rejected(&self.table_on(endpoint)).await.all_rejected()
    }
}
