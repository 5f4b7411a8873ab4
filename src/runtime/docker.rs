//! Docker-backed node and proxy control.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ProxyConfig;
use crate::db::session::first_line;
use crate::runtime::{CommandError, NodeControl, ProxyControl};

/// Drives containers through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
    proxy_container: String,
    remote_config_path: String,
    command_timeout: Duration,
}

impl DockerRuntime {
    pub fn new(proxy: &ProxyConfig) -> Self {
        Self {
            binary: "docker".to_string(),
            proxy_container: proxy.container.clone(),
            remote_config_path: proxy.remote_config_path.clone(),
            command_timeout: Duration::from_secs(proxy.command_timeout_secs),
        }
    }

    /// Use a different CLI (e.g. `podman`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn staged_path(&self) -> String {
        format!("{}.staged", self.remote_config_path)
    }

    /// Run the CLI with `args`, returning trimmed stdout.
    async fn run(&self, args: &[&str]) -> Result<String, CommandError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(command = %command, "Running command");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = match timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(CommandError::Spawn { command, source }),
            Err(_) => {
                return Err(CommandError::Timeout {
                    command,
                    after: self.command_timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(CommandError::Failed {
                command,
                status: output.status.to_string(),
                stderr: first_line(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl NodeControl for DockerRuntime {
    async fn stop(&self, node: &str) -> Result<(), CommandError> {
        self.run(&["stop", node]).await.map(|_| ())
    }

    async fn start(&self, node: &str) -> Result<(), CommandError> {
        self.run(&["start", node]).await.map(|_| ())
    }

    async fn is_running(&self, node: &str) -> Result<bool, CommandError> {
        let out = self.run(&["inspect", "-f", "{{.State.Running}}", node]).await?;
        parse_running(&out).ok_or_else(|| CommandError::Unexpected {
            command: format!("{} inspect {}", self.binary, node),
            output: out,
        })
    }
}

#[async_trait]
impl ProxyControl for DockerRuntime {
    async fn validate(&self, artifact: &Path) -> Result<(), CommandError> {
        let local = artifact.to_string_lossy();
        let staged = self.staged_path();
        let target = format!("{}:{}", self.proxy_container, staged);
        self.run(&["cp", &*local, target.as_str()]).await?;
        self.run(&["exec", self.proxy_container.as_str(), "haproxy", "-c", "-f", staged.as_str()])
            .await
            .map(|_| ())
    }

    async fn push(&self, artifact: &Path) -> Result<(), CommandError> {
        let local = artifact.to_string_lossy();
        let target = format!("{}:{}", self.proxy_container, self.remote_config_path);
        self.run(&["cp", &*local, target.as_str()]).await.map(|_| ())
    }

    async fn reload(&self) -> Result<(), CommandError> {
        // HAProxy in master-worker mode reloads on SIGHUP and drains old workers.
        self.run(&["kill", "-s", "HUP", self.proxy_container.as_str()])
            .await
            .map(|_| ())
    }
}

fn parse_running(output: &str) -> Option<bool> {
    match output.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
