//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_probes_total` (counter): probes by endpoint and outcome
//! - `failover_transitions_total` (counter): completed transitions by target state
//! - `failover_apply_failures_total` (counter): routing applies by failing stage
//! - `failover_fence_failures_total` (counter): promotions aborted by fencing
//! - `failover_cluster_state` (gauge): 0=NORMAL, 1=FAILOVER_ACTIVE

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(endpoint: &str, healthy: bool) {
    metrics::counter!(
        "failover_probes_total",
        "endpoint" => endpoint.to_string(),
        "healthy" => if healthy { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("failover_transitions_total", "to" => to).increment(1);
}

pub fn record_apply_failure(stage: &'static str) {
    metrics::counter!("failover_apply_failures_total", "stage" => stage).increment(1);
}

pub fn record_fence_failure() {
    metrics::counter!("failover_fence_failures_total").increment(1);
}

pub fn record_cluster_state(failover_active: bool) {
    metrics::gauge!("failover_cluster_state").set(if failover_active { 1.0 } else { 0.0 });
}
