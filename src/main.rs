//! PostgreSQL failover controller.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │               FAILOVER CONTROLLER                │
//!                 │                                                  │
//!   primary ◀─────┼── health probe ──▶ TransitionGate                │
//!                 │                        │                         │
//!                 │                        ▼                         │
//!                 │                  state machine ──▶ fence (docker)│
//!                 │                        │                         │
//!   replica ◀─────┼── convergence gate ◀───┤                         │
//!                 │                        ▼                         │
//!   haproxy ◀─────┼───────────────── topology writer                 │
//!                 │                        │                         │
//!                 │                        ▼                         │
//!                 │               watch snapshot ──▶ admin API       │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use failover_controller::config::loader;
use failover_controller::lifecycle::{prepare, wait_for_signal, Shutdown};
use failover_controller::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "failover-controller")]
#[command(about = "Health-driven failover for a PostgreSQL primary/replica pair behind HAProxy", long_about = None)]
struct Cli {
    /// TOML config file. Defaults and FAILOVER_* variables apply without it.
    #[arg(short, long, env = "FAILOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single tick and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = loader::load(cli.config.as_deref())?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        primary = %format!("{}:{}", config.primary.host, config.primary.port),
        replica = %format!("{}:{}", config.replica.host, config.replica.port),
        interval_secs = config.controller.interval_secs,
        proxy_config = %config.proxy.local_config_path,
        "Configuration loaded"
    );

    let prepared = prepare(&config)?;
    let mut controller = prepared.controller;

    if cli.once {
        let outcome = controller.tick().await;
        tracing::info!(outcome = ?outcome, state = %controller.state(), "Single tick complete");
        return Ok(());
    }

    let shutdown = Shutdown::new();

    let admin = if config.admin.enabled {
        let admin_config = config.admin.clone();
        let snapshot = controller.subscribe();
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = failover_controller::admin::serve(&admin_config, snapshot, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let loop_handle = tokio::spawn(controller.run(shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    if let Err(e) = loop_handle.await {
        tracing::error!(error = %e, "Controller task ended abnormally");
    }
    if let Some(admin) = admin {
        let _ = admin.await;
    }

    drop(prepared.lock);
    tracing::info!("Shutdown complete");
    Ok(())
}
