//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active probing (active.rs):
//!     Control loop tick
//!     → connect + SELECT 1 under an explicit timeout
//!     → HealthStatus { healthy, reason }
//!
//! Hysteresis (state.rs):
//!     HealthStatus stream
//!     → consecutive failure / success streaks
//!     → "promotion due" / "restore due" decisions
//! ```
//!
//! # Design Decisions
//! - Every failure cause collapses to `healthy = false` with a reason
//! - Probes never raise past the prober boundary
//! - Streak counters live next to the cluster state, not in a global

pub mod active;
pub mod state;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::Endpoint;

pub use active::PgProber;
pub use state::TransitionGate;

/// Result of a single probe. Only the latest per endpoint is retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub endpoint: String,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            healthy: true,
            checked_at: Utc::now(),
            error: None,
        }
    }

    pub fn unhealthy(endpoint: &str, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            healthy: false,
            checked_at: Utc::now(),
            error: Some(reason.into()),
        }
    }

    /// Reason text for logs; "ok" when healthy.
    pub fn reason(&self) -> &str {
        self.error.as_deref().unwrap_or("ok")
    }
}

/// Reduces an endpoint's condition to a healthy/unhealthy signal.
#[async_trait]
pub trait HealthProber: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> HealthStatus;
}
