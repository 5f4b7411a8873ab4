//! Read-only admin API over the controller's published snapshot.
//!
//! The handlers never touch the controller itself; they clone the latest
//! value out of a `watch` channel.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AdminConfig;
use crate::controller::ClusterSnapshot;

use self::auth::admin_auth_middleware;
use self::handlers::{get_plan, get_status};

#[derive(Clone)]
pub struct AdminState {
    pub snapshot: watch::Receiver<ClusterSnapshot>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(snapshot: watch::Receiver<ClusterSnapshot>, api_key: &str) -> Self {
        Self {
            snapshot,
            api_key: Arc::from(api_key),
        }
    }
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/plan", get(get_plan))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    config: &AdminConfig,
    snapshot: watch::Receiver<ClusterSnapshot>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    let app = setup_admin_router(AdminState::new(snapshot, &config.api_key));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
