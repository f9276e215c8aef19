//! Read-only fleet and liveness routes.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use shared_types::NodeSnapshot;

use crate::error::{GatewayError, Result};
use crate::router::AppState;

/// `GET /v1/nodes`: materialized fleet snapshot.
pub async fn list_nodes(State(state): State<AppState>) -> Result<Json<Vec<NodeSnapshot>>> {
    let nodes = state
        .broker
        .get_nodes()
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(Json(nodes))
}

/// `GET /health` response body.
#[derive(Debug, Serialize)]
pub struct Health {
    /// The gateway is serving.
    pub healthy: bool,
    /// The chain follower considers itself caught up.
    pub synced: bool,
}

/// `GET /health`: liveness plus sync state.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        healthy: true,
        synced: state.tracker.snapshot().is_synced,
    })
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics() -> Result<String> {
    grid_telemetry::encode_metrics().map_err(|e| GatewayError::Internal(e.to_string()))
}
