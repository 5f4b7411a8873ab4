use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::controller::ClusterSnapshot;
use crate::topology::RoutingPlan;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub cluster: ClusterSnapshot,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        cluster: state.snapshot.borrow().clone(),
    })
}

/// The last plan the proxy accepted.
pub async fn get_plan(State(state): State<AdminState>) -> Result<Json<RoutingPlan>, StatusCode> {
    state
        .snapshot
        .borrow()
        .plan
        .clone()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
