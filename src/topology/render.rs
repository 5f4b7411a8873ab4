//! HAProxy artifact rendering.
//!
//! Output depends only on the plan and the proxy settings, so rendering the
//! same plan twice yields byte-identical text.

use std::fmt::Write;

use crate::config::ProxyConfig;
use crate::controller::state::ClusterState;
use crate::topology::plan::{Role, RoutingEntry, RoutingPlan};

/// Render the full proxy configuration for `plan`.
pub fn render(plan: &RoutingPlan, proxy: &ProxyConfig) -> String {
    let mut out = String::with_capacity(1024);

    // `write!` into a String cannot fail.
    let _ = write!(
        out,
        "# Generated by failover-controller. Replaced in full on every apply.\n\
         # state: {state}\n",
        state = plan.state,
    );
    if plan.degraded {
        out.push_str("# degraded: replica convergence was not confirmed before promotion\n");
    }

    let _ = write!(
        out,
        "\nglobal\n    daemon\n    maxconn {maxconn}\n    log stdout local0\n\n\
         defaults\n    mode tcp\n    timeout connect {connect}ms\n    timeout client {client}ms\n    \
         timeout server {server}ms\n    option tcplog\n\n",
        maxconn = proxy.maxconn,
        connect = proxy.timeout_connect_ms,
        client = proxy.timeout_client_ms,
        server = proxy.timeout_server_ms,
    );

    let _ = write!(
        out,
        "# HAProxy Statistics\nlisten stats\n    bind *:{port}\n    mode http\n    stats enable\n    \
         stats uri /stats\n    stats refresh 5s\n    stats admin if TRUE\n\n",
        port = proxy.stats_port,
    );

    let title = match plan.state {
        ClusterState::Normal => "Normal operation",
        ClusterState::FailoverActive => "Replica promoted to primary",
    };
    let _ = write!(
        out,
        "# PostgreSQL Cluster - {title}\nlisten postgres\n    bind *:{port}\n    mode tcp\n    \
         option tcplog\n    balance roundrobin\n    option tcp-check\n    tcp-check connect port {check}\n\n",
        port = proxy.client_port,
        check = plan.check.port,
    );
    for entry in &plan.entries {
        out.push_str(&server_line(entry, plan));
        out.push('\n');
    }

    let _ = write!(
        out,
        "\n# Health check endpoint\nlisten health\n    bind *:{port}\n    mode http\n    \
         option httpchk GET /health\n    http-check expect status 200\n",
        port = proxy.health_port,
    );

    out
}

/// `server <name> <host>:<port> check ... weight <w> [backup]`
fn server_line(entry: &RoutingEntry, plan: &RoutingPlan) -> String {
    let mut line = format!(
        "    server {} {} check port {} inter {}s rise {} fall {} weight {}",
        entry.name,
        entry.address,
        plan.check.port,
        plan.check.inter_secs,
        plan.check.rise,
        plan.check.fall,
        entry.weight,
    );
    if entry.role == Role::Backup {
        line.push_str(" backup");
    }
    line
}
