//! Scripted collaborators for driving the controller without PostgreSQL,
//! docker or HAProxy.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::{Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use tokio::sync::Notify;

use failover_controller::config::ControllerConfig;
use failover_controller::controller::{ConvergenceGate, Controller, GateVerdict};
use failover_controller::db::Endpoint;
use failover_controller::health::{HealthProber, HealthStatus};
use failover_controller::runtime::{CommandError, NodeControl, ProxyControl};
use failover_controller::topology::TopologyWriter;

/// Answers from a queue first, then from a settable default.
pub struct ScriptedProber {
    script: Mutex<VecDeque<bool>>,
    default: AtomicBool,
    calls: AtomicU32,
}

impl ScriptedProber {
    pub fn new(default: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: AtomicBool::new(default),
            calls: AtomicU32::new(0),
        })
    }

    pub fn push(&self, results: &[bool]) {
        self.script.lock().unwrap().extend(results.iter().copied());
    }

    pub fn set_default(&self, healthy: bool) {
        self.default.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProber for ScriptedProber {
    async fn probe(&self, endpoint: &Endpoint) -> HealthStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        if next.unwrap_or_else(|| self.default.load(Ordering::SeqCst)) {
            HealthStatus::healthy(&endpoint.name)
        } else {
            HealthStatus::unhealthy(&endpoint.name, "connection refused")
        }
    }
}

/// In-memory container runtime.
#[derive(Default)]
pub struct FakeNodes {
    pub running: AtomicBool,
    /// `stop` returns an error.
    pub stop_fails: AtomicBool,
    /// `stop` succeeds but the node keeps running.
    pub ignores_stop: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeNodes {
    pub fn running() -> Arc<Self> {
        let nodes = Self::default();
        nodes.running.store(true, Ordering::SeqCst);
        Arc::new(nodes)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NodeControl for FakeNodes {
    async fn stop(&self, node: &str) -> Result<(), CommandError> {
        self.log(format!("stop {node}"));
        if self.stop_fails.load(Ordering::SeqCst) {
            return Err(CommandError::Failed {
                command: format!("docker stop {node}"),
                status: "exit status: 1".into(),
                stderr: "permission denied".into(),
            });
        }
        if !self.ignores_stop.load(Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn start(&self, node: &str) -> Result<(), CommandError> {
        self.log(format!("start {node}"));
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self, _node: &str) -> Result<bool, CommandError> {
        Ok(self.running.load(Ordering::SeqCst))
    }
}

/// Records validate/push/reload and fails the named stage when asked.
#[derive(Default)]
pub struct RecordingProxy {
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_stage: Mutex<Option<&'static str>>,
    /// Reload blocks this long before recording itself.
    pub reload_delay: Mutex<Option<Duration>>,
    pub reload_started: Notify,
}

impl RecordingProxy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_at(&self, stage: Option<&'static str>) {
        *self.fail_stage.lock().unwrap() = stage;
    }

    pub fn slow_reload(&self, delay: Duration) {
        *self.reload_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reloads(&self) -> usize {
        self.calls().iter().filter(|c| **c == "reload").count()
    }

    fn step(&self, stage: &'static str) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(stage);
        if *self.fail_stage.lock().unwrap() == Some(stage) {
            return Err(CommandError::Failed {
                command: format!("haproxy {stage}"),
                status: "exit status: 1".into(),
                stderr: format!("{stage} refused"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProxyControl for RecordingProxy {
    async fn validate(&self, _artifact: &Path) -> Result<(), CommandError> {
        self.step("validate")
    }

    async fn push(&self, _artifact: &Path) -> Result<(), CommandError> {
        self.step("push")
    }

    async fn reload(&self) -> Result<(), CommandError> {
        self.reload_started.notify_one();
        let delay = *self.reload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.step("reload")
    }
}

/// Convergence gate with a fixed verdict.
pub struct FixedGate {
    pub verdict: GateVerdict,
    pub beats: Arc<AtomicU32>,
}

#[async_trait]
impl ConvergenceGate for FixedGate {
    async fn beat(&mut self) {
        self.beats.fetch_add(1, Ordering::SeqCst);
    }

    async fn check(&self) -> GateVerdict {
        self.verdict
    }
}

/// Config that reacts on the first observation, writing under `dir`.
pub fn test_config(dir: &Path) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.controller.failure_threshold = 1;
    config.controller.recovery_threshold = 1;
    config.controller.restore_settle_secs = 0;
    config.controller.fence_timeout_secs = 2;
    config.controller.restore_timeout_secs = 2;
    config.controller.lock_path = dir.join("controller.lock").display().to_string();
    config.proxy.local_config_path = dir.join("haproxy.cfg").display().to_string();
    config
}

pub struct Harness {
    pub controller: Controller,
    pub prober: Arc<ScriptedProber>,
    pub nodes: Arc<FakeNodes>,
    pub proxy: Arc<RecordingProxy>,
    pub beats: Arc<AtomicU32>,
    pub config: ControllerConfig,
}

impl Harness {
    pub fn new(config: ControllerConfig, verdict: Option<GateVerdict>) -> Self {
        let prober = ScriptedProber::new(true);
        let nodes = FakeNodes::running();
        let proxy = RecordingProxy::new();
        let beats = Arc::new(AtomicU32::new(0));

        let writer = TopologyWriter::new(config.proxy.clone(), proxy.clone());
        let mut controller = Controller::new(&config, prober.clone(), nodes.clone(), writer);
        if let Some(verdict) = verdict {
            controller = controller.with_convergence(Box::new(FixedGate {
                verdict,
                beats: beats.clone(),
            }));
        }

        Self {
            controller,
            prober,
            nodes,
            proxy,
            beats,
            config,
        }
    }

    pub fn artifact(&self) -> String {
        std::fs::read_to_string(&self.config.proxy.local_config_path).unwrap()
    }
}

/// Keeps the last value of every gauge; counters and histograms are dropped.
#[derive(Default)]
pub struct GaugeRecorder {
    gauges: Mutex<HashMap<String, Arc<GaugeCell>>>,
}

#[derive(Default)]
struct GaugeCell(Mutex<f64>);

impl GaugeFn for GaugeCell {
    fn increment(&self, value: f64) {
        *self.0.lock().unwrap() += value;
    }

    fn decrement(&self, value: f64) {
        *self.0.lock().unwrap() -= value;
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap() = value;
    }
}

impl GaugeRecorder {
    pub fn gauge(&self, name: &str) -> Option<f64> {
        let gauges = self.gauges.lock().unwrap();
        gauges.get(name).map(|cell| *cell.0.lock().unwrap())
    }
}

impl Recorder for GaugeRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        let cell = self
            .gauges
            .lock()
            .unwrap()
            .entry(key.name().to_string())
            .or_default()
            .clone();
        Gauge::from_arc(cell)
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
