use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use uuid::Uuid;

use failover_controller::config::{loader, ControllerConfig};
use failover_controller::controller::ClusterState;
use failover_controller::db::Endpoint;
use failover_controller::health::{HealthProber, PgProber};
use failover_controller::topology::{render, RoutingPlan};
use failover_controller::verifier::{check_write_rejected, ConvergenceVerifier};

#[derive(Parser)]
#[command(name = "failover-cli")]
#[command(about = "Management CLI for the PostgreSQL failover controller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "FAILOVER_ADMIN_API_KEY", default_value = "")]
    key: String,

    /// Controller config, for the commands that talk to the cluster directly.
    #[arg(short, long, env = "FAILOVER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the running controller's state
    Status,
    /// Show the routing plan the proxy last accepted
    Plan,
    /// Print the proxy config for a state without applying it
    Render {
        #[arg(long, value_enum)]
        state: StateArg,
        #[arg(long)]
        degraded: bool,
    },
    /// Probe one node once
    Probe {
        #[arg(value_enum)]
        node: NodeArg,
    },
    /// Run the replication round trip and the replica write-rejection check
    Verify {
        #[arg(long, default_value_t = 20)]
        timeout_secs: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StateArg {
    Normal,
    #[value(alias = "failover")]
    FailoverActive,
}

#[derive(Clone, Copy, ValueEnum)]
enum NodeArg {
    Primary,
    Replica,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => admin_get(&cli.url, &cli.key, "/admin/status").await?,
        Commands::Plan => admin_get(&cli.url, &cli.key, "/admin/plan").await?,
        Commands::Render { state, degraded } => {
            let config = loader::load(cli.config.as_deref())?;
            let state = match state {
                StateArg::Normal => ClusterState::Normal,
                StateArg::FailoverActive => ClusterState::FailoverActive,
            };
            let mut plan = RoutingPlan::for_state(state, &config.primary, &config.replica, &config.proxy);
            if degraded {
                plan = plan.mark_degraded();
            }
            print!("{}", render(&plan, &config.proxy));
        }
        Commands::Probe { node } => {
            let config = loader::load(cli.config.as_deref())?;
            let endpoint = match node {
                NodeArg::Primary => Endpoint::from(&config.primary),
                NodeArg::Replica => Endpoint::from(&config.replica),
            };
            let prober = PgProber::new(Duration::from_secs(config.controller.probe_timeout_secs));
            let status = prober.probe(&endpoint).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.healthy {
                std::process::exit(1);
            }
        }
        Commands::Verify { timeout_secs } => {
            let config = loader::load(cli.config.as_deref())?;
            let report = verify(&config, Duration::from_secs(timeout_secs)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report["passed"] != Value::Bool(true) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Insert, update and delete on the primary, each observed on the replica,
/// then confirm the replica refuses writes.
async fn verify(config: &ControllerConfig, timeout: Duration) -> Result<Value, Box<dyn std::error::Error>> {
    let connect_timeout = Duration::from_secs(config.controller.probe_timeout_secs);
    let verifier = ConvergenceVerifier::new(&config.convergence, connect_timeout);
    let primary = Endpoint::from(&config.primary);
    let replica = Endpoint::from(&config.replica);
    let table = verifier.table_on(&primary);

    table.ensure().await?;
    let inserted = format!("verify-{}", Uuid::new_v4());
    let id = table.insert(&inserted).await?;
    let insert_seen = verifier.await_value(&replica, id, &inserted, timeout).await;

    let updated = format!("{inserted}-updated");
    table.update(id, &updated).await?;
    let update_seen = verifier.await_value(&replica, id, &updated, timeout).await;

    table.delete(id).await?;
    let delete_seen = verifier.await_absence(&replica, id, timeout).await;

    let rejection = check_write_rejected(&verifier.table_on(&replica)).await;
    let passed = insert_seen && update_seen && delete_seen && rejection.all_rejected();

    Ok(json!({
        "row_id": id,
        "insert_replicated": insert_seen,
        "update_replicated": update_seen,
        "delete_replicated": delete_seen,
        "write_rejection": rejection,
        "passed": passed,
    }))
}

async fn admin_get(url: &str, key: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);

    let res = reqwest::Client::new()
        .get(format!("{url}{path}"))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
