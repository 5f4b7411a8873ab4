//! The failover control loop.
//!
//! # States
//! - NORMAL: primary active, replica backup
//! - FAILOVER_ACTIVE: replica is the only backend, old primary fenced
//!
//! # Transitions
//! ```text
//! NORMAL → FAILOVER_ACTIVE:  promotion due (failure streak)
//!                            → fence primary → convergence gate → apply plan
//! FAILOVER_ACTIVE → NORMAL:  restore due (success streak + settle)
//!                            → start primary → wait healthy → apply plan
//! ```
//!
//! State changes only after the plan is applied. A failed fence, wait or
//! apply leaves the state untouched and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{ControllerConfig, LoopConfig, NodeConfig, ProxyConfig};
use crate::controller::convergence::{ConvergenceGate, GateVerdict};
use crate::controller::fencing::fence;
use crate::controller::state::{ClusterSnapshot, ClusterState, StateRecord};
use crate::db::Endpoint;
use crate::health::{HealthProber, HealthStatus, TransitionGate};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::retry_until;
use crate::runtime::NodeControl;
use crate::topology::{RoutingPlan, TopologyWriter};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Probe agreed with the current state.
    Steady,
    /// Probe disagreed but the streak has not reached its threshold yet.
    Awaiting { towards: ClusterState },
    Transitioned { from: ClusterState, to: ClusterState },
    /// A due transition failed; state unchanged, retried next tick.
    Failed { towards: ClusterState, error: String },
}

pub struct Controller {
    settings: LoopConfig,
    primary_node: NodeConfig,
    replica_node: NodeConfig,
    primary: Endpoint,
    proxy: ProxyConfig,
    prober: Arc<dyn HealthProber>,
    nodes: Arc<dyn NodeControl>,
    writer: TopologyWriter,
    convergence: Option<Box<dyn ConvergenceGate>>,
    gate: TransitionGate,
    record: StateRecord,
    last_probe: Option<HealthStatus>,
    plan: Option<RoutingPlan>,
    pending: Option<String>,
    ticks: u64,
    status_tx: watch::Sender<ClusterSnapshot>,
}

impl Controller {
    pub fn new(
        config: &ControllerConfig,
        prober: Arc<dyn HealthProber>,
        nodes: Arc<dyn NodeControl>,
        writer: TopologyWriter,
    ) -> Self {
        let settings = config.controller.clone();
        let gate = TransitionGate::new(
            settings.failure_threshold,
            settings.recovery_threshold,
            Duration::from_secs(settings.restore_settle_secs),
        );
        let record = StateRecord::initial();
        let (status_tx, _) = watch::channel(ClusterSnapshot::initial(&record));
        metrics::record_cluster_state(record.state == ClusterState::FailoverActive);

        Self {
            settings,
            primary_node: config.primary.clone(),
            replica_node: config.replica.clone(),
            primary: Endpoint::from(&config.primary),
            proxy: config.proxy.clone(),
            prober,
            nodes,
            writer,
            convergence: None,
            gate,
            record,
            last_probe: None,
            plan: None,
            pending: None,
            ticks: 0,
            status_tx,
        }
    }

    /// Gate promotions on replica convergence.
    pub fn with_convergence(mut self, gate: Box<dyn ConvergenceGate>) -> Self {
        self.convergence = Some(gate);
        self
    }

    pub fn state(&self) -> ClusterState {
        self.record.state
    }

    pub fn current_plan(&self) -> Option<&RoutingPlan> {
        self.plan.as_ref()
    }

    /// Read-only view, refreshed after every tick.
    pub fn subscribe(&self) -> watch::Receiver<ClusterSnapshot> {
        self.status_tx.subscribe()
    }

    /// Run until `shutdown` fires. Shutdown is only observed between ticks,
    /// so an in-flight promotion or restore always completes first.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = self.settings.interval_secs,
            failure_threshold = self.settings.failure_threshold,
            recovery_threshold = self.settings.recovery_threshold,
            primary = %self.primary,
            "Failover controller starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.settings.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(state = %self.record.state, "Controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One probe, one decision, at most one transition.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        let status = self.prober.probe(&self.primary).await;
        let now = Instant::now();
        self.gate.observe(status.healthy, now);

        let outcome = match (self.record.state, status.healthy) {
            (ClusterState::Normal, true) => {
                if let Some(gate) = self.convergence.as_mut() {
                    gate.beat().await;
                }
                self.pending = None;
                TickOutcome::Steady
            }
            (ClusterState::FailoverActive, false) => {
                self.pending = None;
                TickOutcome::Steady
            }
            (ClusterState::Normal, false) if self.gate.promotion_due() => {
                self.promote(&status).await
            }
            (ClusterState::FailoverActive, true) if self.gate.restore_due(now) => {
                self.restore().await
            }
            (ClusterState::Normal, false) => TickOutcome::Awaiting {
                towards: ClusterState::FailoverActive,
            },
            (ClusterState::FailoverActive, true) => TickOutcome::Awaiting {
                towards: ClusterState::Normal,
            },
        };

        let streaks = self.gate.streaks();
        if status.healthy {
            tracing::info!(
                state = %self.record.state,
                primary = "healthy",
                consecutive_successes = streaks.consecutive_successes,
                "Status"
            );
        } else {
            tracing::warn!(
                state = %self.record.state,
                primary = "unhealthy",
                reason = %status.reason(),
                consecutive_failures = streaks.consecutive_failures,
                "Status"
            );
        }

        self.last_probe = Some(status);
        self.publish();
        outcome
    }

    async fn promote(&mut self, status: &HealthStatus) -> TickOutcome {
        let towards = ClusterState::FailoverActive;
        tracing::warn!(reason = %status.reason(), "Primary failure confirmed, promoting replica");

        let fence_ceiling = Duration::from_secs(self.settings.fence_timeout_secs);
        let fenced = match fence(
            &self.nodes,
            &self.prober,
            &self.primary_node,
            &self.primary,
            fence_ceiling,
        )
        .await
        {
            Ok(fenced) => fenced,
            Err(e) => {
                tracing::error!(error = %e, "Fencing failed, promotion aborted");
                metrics::record_fence_failure();
                return self.fail(towards, e.to_string());
            }
        };

        tracing::info!(fenced = fenced.node(), "Routing traffic away from fenced primary");
        let mut plan = fenced.promotion_plan(&self.primary_node, &self.replica_node, &self.proxy);
        let verdict = match self.convergence.as_ref() {
            Some(gate) => gate.check().await,
            None => GateVerdict::NoBaseline,
        };
        if verdict != GateVerdict::CaughtUp {
            tracing::error!(verdict = ?verdict, "Replica convergence not confirmed, promoting with degraded plan");
            plan = plan.mark_degraded();
        }

        let reason = format!("primary unhealthy: {}", status.reason());
        self.commit(plan, reason).await
    }

    async fn restore(&mut self) -> TickOutcome {
        let towards = ClusterState::Normal;
        tracing::info!("Primary recovery confirmed, restoring");

        if let Err(e) = self.nodes.start(&self.primary_node.container).await {
            tracing::warn!(error = %e, "Start of primary failed; relying on health check");
        }

        let prober = self.prober.clone();
        let primary = self.primary.clone();
        let ceiling = Duration::from_secs(self.settings.restore_timeout_secs);
        let ready = retry_until(ceiling, Backoff::new(500, 5000), move || {
            let prober = prober.clone();
            let primary = primary.clone();
            async move { prober.probe(&primary).await.healthy }
        })
        .await;

        if !ready.is_satisfied() {
            return self.fail(towards, format!("primary not healthy within {ceiling:?}"));
        }

        let plan = RoutingPlan::for_state(towards, &self.primary_node, &self.replica_node, &self.proxy);
        self.commit(plan, "primary healthy again".to_string()).await
    }

    /// Apply `plan`, and only on success move to its state.
    async fn commit(&mut self, plan: RoutingPlan, reason: String) -> TickOutcome {
        let from = self.record.state;
        let to = plan.state;

        if let Err(e) = self.writer.apply(&plan).await {
            return self.fail(to, e.to_string());
        }

        self.record = StateRecord {
            state: to,
            since: Utc::now(),
            reason,
        };
        self.gate.reset();
        self.pending = None;

        tracing::info!(
            at = %self.record.since,
            previous = %from,
            next = %to,
            reason = %self.record.reason,
            plan = %plan.describe(),
            "State transition"
        );
        metrics::record_transition(to.as_str());
        metrics::record_cluster_state(to == ClusterState::FailoverActive);

        self.plan = Some(plan);
        TickOutcome::Transitioned { from, to }
    }

    fn fail(&mut self, towards: ClusterState, error: String) -> TickOutcome {
        tracing::error!(
            state = %self.record.state,
            towards = %towards,
            error = %error,
            "Transition failed, state unchanged; retrying next tick"
        );
        self.pending = Some(format!("{} -> {}: {}", self.record.state, towards, error));
        TickOutcome::Failed { towards, error }
    }

    fn publish(&self) {
        let snapshot = ClusterSnapshot {
            state: self.record.state,
            since: self.record.since,
            reason: self.record.reason.clone(),
            ticks: self.ticks,
            last_probe: self.last_probe.clone(),
            streaks: self.gate.streaks(),
            plan: self.plan.clone(),
            pending: self.pending.clone(),
        };
        self.status_tx.send_replace(snapshot);
    }
}
