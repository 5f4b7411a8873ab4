//! Applies routing plans to the running proxy.
//!
//! # Steps
//! ```text
//! render → write artifact (temp file + rename)
//!        → validate (proxy config check)
//!        → push (replace live config)
//!        → reload (graceful)
//! ```
//! Any step failing returns an `ApplyError` naming the step. The artifact is
//! always replaced whole, never patched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::runtime::{CommandError, ProxyControl};
use crate::topology::plan::RoutingPlan;
use crate::topology::render::render;

/// The apply sub-step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    Write,
    Validate,
    Push,
    Reload,
}

impl ApplyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStage::Write => "write",
            ApplyStage::Validate => "validate",
            ApplyStage::Push => "push",
            ApplyStage::Reload => "reload",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("proxy rejected config: {0}")]
    Validate(#[source] CommandError),

    #[error("pushing config to proxy: {0}")]
    Push(#[source] CommandError),

    #[error("reloading proxy: {0}")]
    Reload(#[source] CommandError),
}

impl ApplyError {
    pub fn stage(&self) -> ApplyStage {
        match self {
            ApplyError::Write { .. } => ApplyStage::Write,
            ApplyError::Validate(_) => ApplyStage::Validate,
            ApplyError::Push(_) => ApplyStage::Push,
            ApplyError::Reload(_) => ApplyStage::Reload,
        }
    }
}

/// What an apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Artifact written and the proxy reloaded.
    Applied,
    /// Identical to the last applied artifact; the proxy was not touched.
    Unchanged,
}

/// Renders plans and drives the proxy through [`ProxyControl`].
pub struct TopologyWriter {
    proxy: ProxyConfig,
    control: Arc<dyn ProxyControl>,
    artifact_path: PathBuf,
    last_applied: Option<String>,
}

impl TopologyWriter {
    pub fn new(proxy: ProxyConfig, control: Arc<dyn ProxyControl>) -> Self {
        let artifact_path = PathBuf::from(&proxy.local_config_path);
        Self {
            proxy,
            control,
            artifact_path,
            last_applied: None,
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Text of the last successfully applied artifact.
    pub fn last_applied(&self) -> Option<&str> {
        self.last_applied.as_deref()
    }

    pub fn render(&self, plan: &RoutingPlan) -> String {
        render(plan, &self.proxy)
    }

    /// Render and apply `plan`.
    pub async fn apply(&mut self, plan: &RoutingPlan) -> Result<ApplyOutcome, ApplyError> {
        let artifact = self.render(plan);

        if self.last_applied.as_deref() == Some(artifact.as_str()) {
            tracing::debug!(plan = %plan.describe(), "Routing plan unchanged, skipping apply");
            return Ok(ApplyOutcome::Unchanged);
        }

        let result = self.apply_artifact(&artifact).await;
        match &result {
            Ok(()) => {
                tracing::info!(
                    plan = %plan.describe(),
                    path = %self.artifact_path.display(),
                    "Routing plan applied"
                );
                self.last_applied = Some(artifact);
            }
            Err(e) => {
                tracing::error!(
                    plan = %plan.describe(),
                    stage = e.stage().as_str(),
                    error = %e,
                    "Routing plan apply failed"
                );
                metrics::record_apply_failure(e.stage().as_str());
            }
        }
        result.map(|()| ApplyOutcome::Applied)
    }

    async fn apply_artifact(&self, artifact: &str) -> Result<(), ApplyError> {
        write_atomically(&self.artifact_path, artifact)
            .await
            .map_err(|source| ApplyError::Write {
                path: self.artifact_path.clone(),
                source,
            })?;

        self.control
            .validate(&self.artifact_path)
            .await
            .map_err(ApplyError::Validate)?;
        self.control
            .push(&self.artifact_path)
            .await
            .map_err(ApplyError::Push)?;
        self.control.reload().await.map_err(ApplyError::Reload)
    }
}

/// Write to a sibling temp file then rename over `path`.
async fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
