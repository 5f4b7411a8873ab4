//! Process control surface.
//!
//! # Responsibilities
//! - Stop / start / inspect database nodes (fencing, restore)
//! - Validate, push and gracefully reload the proxy configuration
//!
//! # Design Decisions
//! - Two capability traits so any mechanism (container runtime, init system,
//!   remote agent) can back them
//! - Every external command has a bounded runtime
//! - Failures carry the first stderr line for logs

pub mod docker;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use docker::DockerRuntime;

/// Errors from invoking an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from `{command}`: {output}")]
    Unexpected { command: String, output: String },
}

/// Stop/start a database node. `node` is the runtime's identifier for it.
#[async_trait]
pub trait NodeControl: Send + Sync {
    async fn stop(&self, node: &str) -> Result<(), CommandError>;
    async fn start(&self, node: &str) -> Result<(), CommandError>;
    async fn is_running(&self, node: &str) -> Result<bool, CommandError>;
}

/// Validate, push and reload the proxy configuration.
#[async_trait]
pub trait ProxyControl: Send + Sync {
    /// Check the artifact with the proxy's own config checker before it goes live.
    async fn validate(&self, artifact: &Path) -> Result<(), CommandError>;
    /// Replace the live configuration with `artifact`.
    async fn push(&self, artifact: &Path) -> Result<(), CommandError>;
    /// Graceful reload: old connections drain, new ones use the new config.
    async fn reload(&self) -> Result<(), CommandError>;
}
