//! Read-only enforcement check.

use serde::Serialize;

use crate::db::DbError;
use crate::verifier::table::{ScenarioTable, WriteProbe};

/// How the endpoint answered one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Refused with SQLSTATE 25006 (read-only transaction).
    Rejected,
    Accepted,
    /// Connection failure, timeout or any other error; says nothing about
    /// read-only enforcement.
    Inconclusive,
}

impl AttemptOutcome {
    pub fn classify(result: &Result<u64, DbError>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Accepted,
            Err(e) if e.is_read_only_rejection() => AttemptOutcome::Rejected,
            Err(_) => AttemptOutcome::Inconclusive,
        }
    }
}

/// Outcome of one write attempt against an endpoint expected to be read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteAttempt {
    pub statement: &'static str,
    pub outcome: AttemptOutcome,
    /// First line of the error, or the accepted row count.
    pub detail: String,
}

/// Results for INSERT, UPDATE and DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReport {
    pub endpoint: String,
    pub attempts: Vec<WriteAttempt>,
}

impl RejectionReport {
    /// True only when every statement was refused as read-only.
    pub fn all_rejected(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| a.outcome == AttemptOutcome::Rejected)
    }
}

/// Attempt each write statement and record how the endpoint answered.
///
/// Attempts run inside transactions that are rolled back, so an endpoint that
/// wrongly accepts writes still ends up with zero persisted rows.
pub async fn check_write_rejected(table: &ScenarioTable) -> RejectionReport {
    let mut attempts = Vec::with_capacity(WriteProbe::ALL.len());

    for probe in WriteProbe::ALL {
        let result = table.try_write(probe).await;
        let outcome = AttemptOutcome::classify(&result);
        let detail = match &result {
            Ok(rows) => format!("accepted ({rows} rows, rolled back)"),
            Err(e) => e.summary(),
        };

        match outcome {
            AttemptOutcome::Rejected => tracing::info!(
                endpoint = %table.endpoint(),
                statement = probe.as_str(),
                reason = %detail,
                "Write blocked as expected"
            ),
            AttemptOutcome::Accepted => tracing::error!(
                endpoint = %table.endpoint(),
                statement = probe.as_str(),
                "Endpoint accepted a write it should have rejected"
            ),
            AttemptOutcome::Inconclusive => tracing::warn!(
                endpoint = %table.endpoint(),
                statement = probe.as_str(),
                error = %detail,
                "Write attempt failed for a reason other than read-only enforcement"
            ),
        }

        attempts.push(WriteAttempt {
            statement: probe.as_str(),
            outcome,
            detail,
        });
    }

    RejectionReport {
        endpoint: table.endpoint().to_string(),
        attempts,
    }
}
