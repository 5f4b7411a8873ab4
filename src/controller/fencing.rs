//! Fencing the old primary before promotion.
//!
//! A [`Fenced`] value can only be obtained from [`fence`], and the failover
//! routing plan can only be built from a `Fenced`. Promotion therefore cannot
//! reach the proxy unless the old primary was confirmed stopped.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{NodeConfig, ProxyConfig};
use crate::controller::state::ClusterState;
use crate::db::Endpoint;
use crate::health::HealthProber;
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::retry_until;
use crate::runtime::{CommandError, NodeControl};
use crate::topology::RoutingPlan;

#[derive(Debug, Error)]
pub enum FenceError {
    #[error("stopping {node} failed: {source}")]
    Stop {
        node: String,
        #[source]
        source: CommandError,
    },

    #[error("{node} still running after {after:?}")]
    StillRunning { node: String, after: Duration },

    #[error("{node} still answers queries after stop")]
    StillServing { node: String },
}

/// Proof that the old primary cannot accept writes.
#[derive(Debug)]
pub struct Fenced {
    node: String,
}

impl Fenced {
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Replica-only plan. Requires the fence proof.
    pub fn promotion_plan(
        &self,
        primary: &NodeConfig,
        replica: &NodeConfig,
        proxy: &ProxyConfig,
    ) -> RoutingPlan {
        RoutingPlan::for_state(ClusterState::FailoverActive, primary, replica, proxy)
    }
}

/// Stop `node` and confirm it is down: not running, and not answering probes.
pub async fn fence(
    nodes: &Arc<dyn NodeControl>,
    prober: &Arc<dyn HealthProber>,
    node: &NodeConfig,
    endpoint: &Endpoint,
    ceiling: Duration,
) -> Result<Fenced, FenceError> {
    tracing::info!(node = %node.container, "Fencing old primary");

    // A stop error is tolerated only if the node turns out to be down anyway
    // (e.g. the container already exited).
    let stop_error = nodes.stop(&node.container).await.err();

    let nodes_c = nodes.clone();
    let container = node.container.clone();
    let stopped = retry_until(ceiling, Backoff::new(250, 2000), move || {
        let nodes = nodes_c.clone();
        let container = container.clone();
        async move { matches!(nodes.is_running(&container).await, Ok(false)) }
    })
    .await;

    if !stopped.is_satisfied() {
        return Err(match stop_error {
            Some(source) => FenceError::Stop {
                node: node.container.clone(),
                source,
            },
            None => FenceError::StillRunning {
                node: node.container.clone(),
                after: ceiling,
            },
        });
    }

    if prober.probe(endpoint).await.healthy {
        return Err(FenceError::StillServing {
            node: node.container.clone(),
        });
    }

    tracing::info!(node = %node.container, "Old primary fenced");
    Ok(Fenced {
        node: node.container.clone(),
    })
}
