//! Routing plans derived from cluster state.

use serde::Serialize;

use crate::config::{CheckConfig, NodeConfig, ProxyConfig};
use crate::controller::state::ClusterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Active,
    Backup,
}

/// One `server` line in the proxy artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingEntry {
    pub name: String,
    pub address: String,
    pub role: Role,
    pub weight: u32,
}

/// Full description of where the proxy sends connections.
///
/// Built fresh for every transition and always applied as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingPlan {
    pub state: ClusterState,
    pub entries: Vec<RoutingEntry>,
    pub check: CheckConfig,
    /// Set when a promotion could not confirm the replica had caught up.
    pub degraded: bool,
}

impl RoutingPlan {
    /// NORMAL → primary active + replica backup; FAILOVER_ACTIVE → replica only.
    pub fn for_state(
        state: ClusterState,
        primary: &NodeConfig,
        replica: &NodeConfig,
        proxy: &ProxyConfig,
    ) -> Self {
        let entries = match state {
            ClusterState::Normal => vec![
                entry(primary, Role::Active, proxy.active_weight),
                entry(replica, Role::Backup, proxy.backup_weight),
            ],
            ClusterState::FailoverActive => vec![entry(replica, Role::Active, proxy.active_weight)],
        };

        Self {
            state,
            entries,
            check: proxy.check.clone(),
            degraded: false,
        }
    }

    pub fn mark_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub fn active(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.iter().filter(|e| e.role == Role::Active)
    }

    pub fn backups(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.iter().filter(|e| e.role == Role::Backup)
    }

    /// Short form for logs, e.g. `active=postgres-primary backup=postgres-replica-1`.
    pub fn describe(&self) -> String {
        let mut out = format!("active={}", names(self.active()));
        let backups = names(self.backups());
        if !backups.is_empty() {
            out.push_str(&format!(" backup={backups}"));
        }
        if self.degraded {
            out.push_str(" degraded");
        }
        out
    }
}

fn names<'a>(entries: impl Iterator<Item = &'a RoutingEntry>) -> String {
    entries.map(|e| e.name.as_str()).collect::<Vec<_>>().join(",")
}

fn entry(node: &NodeConfig, role: Role, weight: u32) -> RoutingEntry {
    RoutingEntry {
        name: node.backend_name.clone(),
        address: node.backend_address.clone(),
        role,
        weight,
    }
}
