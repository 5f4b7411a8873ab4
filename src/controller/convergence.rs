//! Promotion readiness: has the replica caught up with the primary?
//!
//! While NORMAL, each healthy tick refreshes a heartbeat row on the primary
//! with a fresh payload. Before promoting, the replica must show the last
//! payload that was written successfully.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{DbError, Endpoint};
use crate::verifier::{await_state, ConvergenceVerifier, Expectation, RowReader, ScenarioTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    CaughtUp,
    Lagging,
    NoBaseline,
}

/// Seam between the control loop and the replication check.
#[async_trait]
pub trait ConvergenceGate: Send + Sync {
    /// Record a fresh baseline write on the primary.
    async fn beat(&mut self);

    /// Check whether the replica has the last baseline.
    async fn check(&self) -> GateVerdict;
}

/// Write side of the heartbeat row.
#[async_trait]
pub trait HeartbeatWriter: Send + Sync {
    async fn ensure(&self) -> Result<(), DbError>;
    async fn insert(&self, payload: &str) -> Result<i32, DbError>;
    /// Rows changed; 0 when the row is gone.
    async fn update(&self, row_id: i32, payload: &str) -> Result<u64, DbError>;
}

#[async_trait]
impl HeartbeatWriter for ScenarioTable {
    async fn ensure(&self) -> Result<(), DbError> {
        ScenarioTable::ensure(self).await
    }

    async fn insert(&self, payload: &str) -> Result<i32, DbError> {
        ScenarioTable::insert(self, payload).await
    }

    async fn update(&self, row_id: i32, payload: &str) -> Result<u64, DbError> {
        ScenarioTable::update(self, row_id, payload).await
    }
}

/// Heartbeat row written on the primary and polled on the replica.
pub struct HeartbeatGate {
    writer: Box<dyn HeartbeatWriter>,
    reader: Box<dyn RowReader>,
    poll_interval: Duration,
    gate_timeout: Duration,
    baseline: Option<(i32, String)>,
}

impl HeartbeatGate {
    pub fn new(
        writer: Box<dyn HeartbeatWriter>,
        reader: Box<dyn RowReader>,
        poll_interval: Duration,
        gate_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            reader,
            poll_interval,
            gate_timeout,
            baseline: None,
        }
    }

    /// Production wiring: the verifier's table on both nodes.
    pub fn between(
        verifier: &ConvergenceVerifier,
        primary: &Endpoint,
        replica: &Endpoint,
        gate_timeout: Duration,
    ) -> Self {
        Self::new(
            Box::new(verifier.table_on(primary)),
            Box::new(verifier.table_on(replica)),
            verifier.poll_interval(),
            gate_timeout,
        )
    }

    /// Row id and payload the replica is expected to show.
    pub fn baseline(&self) -> Option<(i32, &str)> {
        self.baseline.as_ref().map(|(id, payload)| (*id, payload.as_str()))
    }

    async fn write(&self, payload: &str) -> Result<i32, DbError> {
        if let Some((id, _)) = self.baseline {
            if self.writer.update(id, payload).await? == 1 {
                return Ok(id);
            }
        }
        // First beat, or the row was removed underneath us.
        self.writer.ensure().await?;
        self.writer.insert(payload).await
    }
}

#[async_trait]
impl ConvergenceGate for HeartbeatGate {
    async fn beat(&mut self) {
        let payload = format!("heartbeat-{}", Uuid::new_v4());
        match self.write(&payload).await {
            Ok(id) => {
                tracing::debug!(row_id = id, payload = %payload, "Heartbeat written");
                self.baseline = Some((id, payload));
            }
            // Keep the previous baseline; the replica must have at least that.
            Err(e) => tracing::warn!(error = %e.summary(), "Heartbeat write failed"),
        }
    }

    async fn check(&self) -> GateVerdict {
        let Some((id, payload)) = self.baseline() else {
            return GateVerdict::NoBaseline;
        };
        let expect = Expectation::Value(payload.to_string());
        if await_state(self.reader.as_ref(), id, &expect, self.gate_timeout, self.poll_interval).await {
            GateVerdict::CaughtUp
        } else {
            GateVerdict::Lagging
        }
    }
}
