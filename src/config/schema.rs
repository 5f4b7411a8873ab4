//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the failover controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// The node that normally accepts writes.
    pub primary: NodeConfig,

    /// The read-only standby promoted on failover.
    pub replica: NodeConfig,

    /// Control loop cadence, thresholds and timeouts.
    pub controller: LoopConfig,

    /// Proxy artifact and process settings.
    pub proxy: ProxyConfig,

    /// Convergence verifier settings.
    pub convergence: ConvergenceConfig,

    /// Admin status surface.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            primary: NodeConfig::primary(),
            replica: NodeConfig::replica(),
            controller: LoopConfig::default(),
            proxy: ProxyConfig::default(),
            convergence: ConvergenceConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A database node as seen by the controller and by the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Logical name used in logs (`primary`, `replica`).
    pub name: String,

    /// Host the controller connects to.
    pub host: String,

    /// Port the controller connects to.
    pub port: u16,

    pub user: String,

    #[serde(default)]
    pub password: String,

    pub dbname: String,

    /// Container running this node, used for fencing and restarts.
    pub container: String,

    /// `server` name in the proxy artifact.
    pub backend_name: String,

    /// Address the proxy dials (e.g. "postgres-primary:5432").
    pub backend_address: String,
}

impl NodeConfig {
    pub fn primary() -> Self {
        Self {
            name: "primary".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "blink_user".to_string(),
            password: String::new(),
            dbname: "blink_db".to_string(),
            container: "postgres-primary".to_string(),
            backend_name: "postgres-primary".to_string(),
            backend_address: "postgres-primary:5432".to_string(),
        }
    }

    pub fn replica() -> Self {
        Self {
            name: "replica".to_string(),
            host: "localhost".to_string(),
            port: 5433,
            user: "blink_user".to_string(),
            password: String::new(),
            dbname: "blink_db".to_string(),
            container: "postgres-replica-1".to_string(),
            backend_name: "postgres-replica-1".to_string(),
            backend_address: "postgres-replica-1:5432".to_string(),
        }
    }
}

/// Control loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Seconds between ticks.
    pub interval_secs: u64,

    /// Consecutive failed probes required before promoting.
    pub failure_threshold: u32,

    /// Consecutive healthy probes required before restoring.
    pub recovery_threshold: u32,

    /// Seconds the primary must stay up after recovery is first observed.
    pub restore_settle_secs: u64,

    /// Ceiling for the wait-until-healthy step of a restore.
    pub restore_timeout_secs: u64,

    /// Bound on a single probe (connect + `SELECT 1`).
    pub probe_timeout_secs: u64,

    /// Ceiling for confirming the old primary is stopped.
    pub fence_timeout_secs: u64,

    /// Lock file guarding against a second controller on the same proxy.
    pub lock_path: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            failure_threshold: 3,
            recovery_threshold: 2,
            restore_settle_secs: 5,
            restore_timeout_secs: 30,
            probe_timeout_secs: 4,
            fence_timeout_secs: 30,
            lock_path: "failover-controller.lock".to_string(),
        }
    }
}

/// Proxy (HAProxy) artifact and process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Container running the proxy.
    pub container: String,

    /// Where the rendered artifact is written locally.
    pub local_config_path: String,

    /// Config path inside the proxy container.
    pub remote_config_path: String,

    /// Seconds allowed for each docker command.
    pub command_timeout_secs: u64,

    pub maxconn: u32,
    pub stats_port: u16,
    pub client_port: u16,
    pub health_port: u16,

    pub timeout_connect_ms: u64,
    pub timeout_client_ms: u64,
    pub timeout_server_ms: u64,

    /// Backend health-check parameters written on each `server` line.
    pub check: CheckConfig,

    /// Weight of the active backend.
    pub active_weight: u32,

    /// Weight of the backup backend.
    pub backup_weight: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            container: "haproxy".to_string(),
            local_config_path: "haproxy.cfg".to_string(),
            remote_config_path: "/usr/local/etc/haproxy/haproxy.cfg".to_string(),
            command_timeout_secs: 15,
            maxconn: 256,
            stats_port: 5000,
            client_port: 5432,
            health_port: 8080,
            timeout_connect_ms: 5000,
            timeout_client_ms: 50000,
            timeout_server_ms: 50000,
            check: CheckConfig::default(),
            active_weight: 100,
            backup_weight: 50,
        }
    }
}

/// Proxy-side backend health check parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckConfig {
    pub port: u16,
    pub inter_secs: u64,
    pub rise: u32,
    pub fall: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            port: 5432,
            inter_secs: 3,
            rise: 2,
            fall: 3,
        }
    }
}

/// Convergence verifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Disposable table used for heartbeats and round-trip checks.
    pub table: String,

    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Default deadline for round-trip checks.
    pub timeout_secs: u64,

    /// Keep a heartbeat row on the primary to gate promotion.
    pub heartbeat_enabled: bool,

    /// How long promotion waits for the replica to show the last heartbeat.
    pub promotion_gate_secs: u64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            table: "cluster_flow_test".to_string(),
            poll_interval_ms: 500,
            timeout_secs: 20,
            heartbeat_enabled: true,
            promotion_gate_secs: 10,
        }
    }
}

/// Admin status surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin status endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    pub bind_address: String,
}

pub(crate) const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
