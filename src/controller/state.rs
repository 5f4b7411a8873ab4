//! Cluster state owned by the control loop.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::state::Streaks;
use crate::health::HealthStatus;
use crate::topology::RoutingPlan;

/// Which node the proxy is sending traffic to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    /// Primary active, replica as backup. Assumes the primary is healthy.
    Normal,
    /// Replica is the only backend. Assumes the primary is unhealthy.
    FailoverActive,
}

impl ClusterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterState::Normal => "NORMAL",
            ClusterState::FailoverActive => "FAILOVER_ACTIVE",
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state value and when it last changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord {
    pub state: ClusterState,
    pub since: DateTime<Utc>,
    pub reason: String,
}

impl StateRecord {
    pub fn initial() -> Self {
        Self {
            state: ClusterState::Normal,
            since: Utc::now(),
            reason: "startup".to_string(),
        }
    }
}

/// Read-only copy of the controller's view, published after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub state: ClusterState,
    pub since: DateTime<Utc>,
    pub reason: String,
    pub ticks: u64,
    pub last_probe: Option<HealthStatus>,
    pub streaks: Streaks,
    pub plan: Option<RoutingPlan>,
    /// Transition attempted on the last tick that did not complete.
    pub pending: Option<String>,
}

impl ClusterSnapshot {
    pub fn initial(record: &StateRecord) -> Self {
        Self {
            state: record.state,
            since: record.since,
            reason: record.reason.clone(),
            ticks: 0,
            last_probe: None,
            streaks: Streaks::default(),
            plan: None,
            pending: None,
        }
    }
}
