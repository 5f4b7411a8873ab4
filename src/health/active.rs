//! Active health probing against PostgreSQL.
//!
//! # Responsibilities
//! - Open a connection, run `SELECT 1`, release the connection
//! - Bound the whole round trip with an explicit timeout
//! - Fold DNS, auth, refusal, timeout and query errors into `healthy = false`

use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use crate::db::{DbError, Endpoint, PgSession};
use crate::health::{HealthProber, HealthStatus};
use crate::observability::metrics;

/// Prober that speaks the PostgreSQL wire protocol.
#[derive(Debug, Clone)]
pub struct PgProber {
    timeout: Duration,
}

impl PgProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn round_trip(&self, endpoint: &Endpoint) -> Result<(), DbError> {
        // The session is dropped on every path out of this block.
        let session = PgSession::connect(endpoint, self.timeout).await?;
        session.ping().await
    }
}

#[async_trait]
impl HealthProber for PgProber {
    async fn probe(&self, endpoint: &Endpoint) -> HealthStatus {
        let result = match time::timeout(self.timeout, self.round_trip(endpoint)).await {
            Ok(inner) => inner,
            Err(_) => Err(DbError::Timeout(self.timeout)),
        };

        let status = match result {
            Ok(()) => {
                tracing::debug!(endpoint = %endpoint, "Probe succeeded");
                HealthStatus::healthy(&endpoint.name)
            }
            Err(e) => {
                let reason = e.summary();
                tracing::warn!(endpoint = %endpoint, reason = %reason, "Probe failed");
                HealthStatus::unhealthy(&endpoint.name, reason)
            }
        };

        metrics::record_probe(&status.endpoint, status.healthy);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;

    #[tokio::test]
    async fn test_refused_connection_is_unhealthy() {
        // Port 1 on loopback is never a PostgreSQL server.
        let mut node = NodeConfig::primary();
        node.host = "127.0.0.1".into();
        node.port = 1;
        let endpoint = Endpoint::from(&node);

        let status = PgProber::new(Duration::from_secs(2)).probe(&endpoint).await;
        assert!(!status.healthy);
        assert_eq!(status.endpoint, "primary");
        assert!(status.error.is_some());
    }
}
