//! Control-loop behavior against scripted collaborators.

use std::sync::atomic::Ordering;
use std::time::Duration;

use failover_controller::controller::{ClusterState, GateVerdict, TickOutcome};
use failover_controller::lifecycle::Shutdown;
use failover_controller::topology::Role;

mod common;

use common::{test_config, GaugeRecorder, Harness};

const PRIMARY_ACTIVE: &str = "server postgres-primary postgres-primary:5432 check port 5432 inter 3s rise 2 fall 3 weight 100\n";
const REPLICA_BACKUP: &str = "server postgres-replica-1 postgres-replica-1:5432 check port 5432 inter 3s rise 2 fall 3 weight 50 backup";
const REPLICA_ACTIVE: &str = "server postgres-replica-1 postgres-replica-1:5432 check port 5432 inter 3s rise 2 fall 3 weight 100\n";

#[tokio::test(start_paused = true)]
async fn test_healthy_primary_is_steady() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));

    for _ in 0..3 {
        assert_eq!(h.controller.tick().await, TickOutcome::Steady);
    }

    assert_eq!(h.controller.state(), ClusterState::Normal);
    assert!(h.proxy.calls().is_empty(), "no apply while nothing changes");
    assert!(h.nodes.calls().is_empty());
    assert_eq!(h.beats.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_primary_failure_promotes_replica_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);

    let outcome = h.controller.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Transitioned {
            from: ClusterState::Normal,
            to: ClusterState::FailoverActive,
        }
    );
    assert_eq!(h.controller.state(), ClusterState::FailoverActive);
    assert_eq!(h.nodes.calls(), vec!["stop postgres-primary".to_string()]);
    assert_eq!(h.proxy.calls(), vec!["validate", "push", "reload"]);

    let artifact = h.artifact();
    assert!(artifact.contains("# state: FAILOVER_ACTIVE"));
    assert!(artifact.contains(REPLICA_ACTIVE));
    assert!(!artifact.contains("server postgres-primary"));
    assert!(!artifact.contains("# degraded"));

    // Primary still down: no further applies.
    for _ in 0..3 {
        assert_eq!(h.controller.tick().await, TickOutcome::Steady);
    }
    assert_eq!(h.proxy.reloads(), 1);
    assert_eq!(h.nodes.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_primary_recovery_restores_normal() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.controller.tick().await;
    assert_eq!(h.controller.state(), ClusterState::FailoverActive);

    h.prober.set_default(true);
    let outcome = h.controller.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Transitioned {
            from: ClusterState::FailoverActive,
            to: ClusterState::Normal,
        }
    );
    assert_eq!(
        h.nodes.calls(),
        vec!["stop postgres-primary".to_string(), "start postgres-primary".to_string()]
    );
    assert_eq!(h.proxy.reloads(), 2);

    let artifact = h.artifact();
    assert!(artifact.contains("# state: NORMAL"));
    assert!(artifact.contains(PRIMARY_ACTIVE));
    assert!(artifact.contains(REPLICA_BACKUP));

    let plan = h.controller.current_plan().unwrap();
    assert_eq!(plan.active().count(), 1);
    assert_eq!(plan.backups().count(), 1);
    assert!(plan.entries.iter().any(|e| e.name == "postgres-primary" && e.role == Role::Active));
}

#[tokio::test(start_paused = true)]
async fn test_failed_apply_keeps_state_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.proxy.fail_at(Some("reload"));

    let outcome = h.controller.tick().await;
    assert!(matches!(
        outcome,
        TickOutcome::Failed { towards: ClusterState::FailoverActive, .. }
    ));
    assert_eq!(h.controller.state(), ClusterState::Normal);
    assert!(h.controller.current_plan().is_none());

    let snapshot = h.controller.subscribe().borrow().clone();
    assert_eq!(snapshot.state, ClusterState::Normal);
    assert!(snapshot.pending.as_deref().unwrap_or_default().contains("reload refused"));

    h.proxy.fail_at(None);
    let outcome = h.controller.tick().await;
    assert!(matches!(outcome, TickOutcome::Transitioned { .. }));
    assert_eq!(h.controller.state(), ClusterState::FailoverActive);
    assert!(h.controller.subscribe().borrow().pending.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_validation_failure_never_reaches_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.proxy.fail_at(Some("validate"));

    h.controller.tick().await;
    assert_eq!(h.proxy.calls(), vec!["validate"]);
    assert_eq!(h.controller.state(), ClusterState::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_fence_failure_aborts_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.nodes.stop_fails.store(true, Ordering::SeqCst);

    let outcome = h.controller.tick().await;
    match outcome {
        TickOutcome::Failed { towards, error } => {
            assert_eq!(towards, ClusterState::FailoverActive);
            assert!(error.contains("stopping postgres-primary failed"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.controller.state(), ClusterState::Normal);
    assert!(h.proxy.calls().is_empty(), "proxy untouched without a fence");
}

#[tokio::test(start_paused = true)]
async fn test_node_that_ignores_stop_is_not_fenced() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.nodes.ignores_stop.store(true, Ordering::SeqCst);

    let outcome = h.controller.tick().await;
    assert!(matches!(outcome, TickOutcome::Failed { ref error, .. } if error.contains("still running")));
    assert!(h.proxy.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_node_still_answering_is_not_fenced() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    // Tick probe fails, the post-stop probe answers.
    h.prober.push(&[false, true]);

    let outcome = h.controller.tick().await;
    assert!(matches!(outcome, TickOutcome::Failed { ref error, .. } if error.contains("still answers")));
    assert_eq!(h.controller.state(), ClusterState::Normal);
    assert!(h.proxy.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failure_threshold_delays_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.controller.failure_threshold = 3;
    let mut h = Harness::new(config, Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);

    for _ in 0..2 {
        assert_eq!(
            h.controller.tick().await,
            TickOutcome::Awaiting { towards: ClusterState::FailoverActive }
        );
    }
    assert!(h.nodes.calls().is_empty());

    assert!(matches!(h.controller.tick().await, TickOutcome::Transitioned { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_healthy_probe_resets_failure_streak() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.controller.failure_threshold = 2;
    let mut h = Harness::new(config, Some(GateVerdict::CaughtUp));
    h.prober.push(&[false, true, false]);

    assert!(matches!(h.controller.tick().await, TickOutcome::Awaiting { .. }));
    assert_eq!(h.controller.tick().await, TickOutcome::Steady);
    assert!(matches!(h.controller.tick().await, TickOutcome::Awaiting { .. }));
    assert_eq!(h.controller.state(), ClusterState::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_restore_waits_for_settle_period() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.controller.recovery_threshold = 2;
    config.controller.restore_settle_secs = 5;
    let mut h = Harness::new(config, Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.controller.tick().await;
    assert_eq!(h.controller.state(), ClusterState::FailoverActive);

    h.prober.set_default(true);
    assert!(matches!(h.controller.tick().await, TickOutcome::Awaiting { .. }));
    // Streak reached, settle not yet.
    assert!(matches!(h.controller.tick().await, TickOutcome::Awaiting { .. }));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(matches!(h.controller.tick().await, TickOutcome::Transitioned { .. }));
    assert_eq!(h.controller.state(), ClusterState::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_lagging_replica_marks_plan_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::Lagging));
    h.prober.set_default(false);

    assert!(matches!(h.controller.tick().await, TickOutcome::Transitioned { .. }));
    assert!(h.controller.current_plan().unwrap().degraded);
    assert!(h.artifact().contains("# degraded:"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_gate_marks_plan_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), None);
    h.prober.set_default(false);

    h.controller.tick().await;
    assert!(h.controller.current_plan().unwrap().degraded);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_tracks_ticks_and_streaks() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.controller.failure_threshold = 5;
    let mut h = Harness::new(config, Some(GateVerdict::CaughtUp));
    let rx = h.controller.subscribe();
    h.prober.set_default(false);

    h.controller.tick().await;
    h.controller.tick().await;

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.ticks, 2);
    assert_eq!(snapshot.streaks.consecutive_failures, 2);
    assert_eq!(snapshot.state, ClusterState::Normal);
    assert!(!snapshot.last_probe.unwrap().healthy);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    let prober = h.prober.clone();
    let shutdown = Shutdown::new();

    let handle = tokio::spawn(h.controller.run(shutdown.subscribe()));
    tokio::time::sleep(Duration::from_secs(25)).await;
    shutdown.trigger();
    handle.await.unwrap();

    // Immediate first tick plus one every 10s.
    assert_eq!(prober.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_reload_completes_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.proxy.slow_reload(Duration::from_secs(5));
    let proxy = h.proxy.clone();
    let rx = h.controller.subscribe();
    let shutdown = Shutdown::new();

    let handle = tokio::spawn(h.controller.run(shutdown.subscribe()));
    proxy.reload_started.notified().await;
    shutdown.trigger();
    handle.await.unwrap();

    assert_eq!(proxy.reloads(), 1);
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.state, ClusterState::FailoverActive);
    let plan = snapshot.plan.expect("plan applied before exit");
    assert_eq!(plan.state, ClusterState::FailoverActive);
    assert_eq!(plan.entries.len(), 1);
    assert_eq!(plan.entries[0].name, "postgres-replica-1");
    assert_eq!(plan.entries[0].role, Role::Active);
}

#[tokio::test(start_paused = true)]
async fn test_healthy_healthy_unhealthy_applies_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.push(&[true, true, false]);
    // Post-stop fence probe.
    h.prober.set_default(false);

    h.controller.tick().await;
    h.controller.tick().await;
    assert!(h.proxy.calls().is_empty());
    h.controller.tick().await;

    assert_eq!(h.controller.state(), ClusterState::FailoverActive);
    assert_eq!(h.proxy.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_healthy_from_failover_applies_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    h.prober.set_default(false);
    h.controller.tick().await;
    let before = h.proxy.reloads();

    h.prober.push(&[false, true]);
    h.prober.set_default(true);
    assert_eq!(h.controller.tick().await, TickOutcome::Steady);
    assert!(matches!(h.controller.tick().await, TickOutcome::Transitioned { .. }));

    assert_eq!(h.controller.state(), ClusterState::Normal);
    assert_eq!(h.proxy.reloads() - before, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cluster_state_gauge_reported_from_startup() {
    let recorder = GaugeRecorder::default();
    let _guard = metrics::set_default_local_recorder(&recorder);
    let dir = tempfile::tempdir().unwrap();

    let mut h = Harness::new(test_config(dir.path()), Some(GateVerdict::CaughtUp));
    assert_eq!(recorder.gauge("failover_cluster_state"), Some(0.0));

    h.prober.set_default(false);
    h.controller.tick().await;
    assert_eq!(h.controller.state(), ClusterState::FailoverActive);
    assert_eq!(recorder.gauge("failover_cluster_state"), Some(1.0));
}
