//! Startup orchestration.
//!
//! Order: lock first (so two controllers never race on the proxy), then
//! metrics, then the controller and its collaborators.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ControllerConfig;
use crate::controller::{Controller, HeartbeatGate};
use crate::db::Endpoint;
use crate::health::PgProber;
use crate::lifecycle::lock::{ControllerLock, LockError};
use crate::observability::metrics::init_metrics;
use crate::runtime::DockerRuntime;
use crate::topology::TopologyWriter;
use crate::verifier::ConvergenceVerifier;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Everything `main` needs to run the loop. Dropping it releases the lock.
pub struct Prepared {
    pub controller: Controller,
    pub lock: ControllerLock,
}

pub fn prepare(config: &ControllerConfig) -> Result<Prepared, StartupError> {
    let lock = ControllerLock::acquire(&config.controller.lock_path)?;
    tracing::info!(path = %lock.path().display(), "Controller lock acquired");

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        init_metrics(addr);
    }

    Ok(Prepared {
        controller: build_controller(config),
        lock,
    })
}

/// Wire the production collaborators: PostgreSQL probes, the docker CLI and
/// the heartbeat convergence gate when enabled.
pub fn build_controller(config: &ControllerConfig) -> Controller {
    let probe_timeout = Duration::from_secs(config.controller.probe_timeout_secs);
    let prober = Arc::new(PgProber::new(probe_timeout));
    let docker = Arc::new(DockerRuntime::new(&config.proxy));
    let writer = TopologyWriter::new(config.proxy.clone(), docker.clone());

    let controller = Controller::new(config, prober, docker, writer);
    if !config.convergence.heartbeat_enabled {
        tracing::warn!("Heartbeat disabled; promotions will be marked degraded");
        return controller;
    }

    let verifier = ConvergenceVerifier::new(&config.convergence, probe_timeout);
    let gate = HeartbeatGate::between(
        &verifier,
        &Endpoint::from(&config.primary),
        &Endpoint::from(&config.replica),
        Duration::from_secs(config.convergence.promotion_gate_secs),
    );
    controller.with_convergence(Box::new(gate))
}
