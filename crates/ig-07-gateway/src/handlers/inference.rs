//! `POST /v1/inference`: serve an inference request against the fleet.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::dispatch::dispatch_inference;
use crate::error::{GatewayError, Result};
use crate::router::AppState;

/// Forward one inference request. The `model` field of the JSON body
/// selects the fleet subset; the upstream response is relayed verbatim.
pub async fn serve(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let json: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::BadRequest(format!("invalid JSON body: {e}")))?;
    let model = json
        .get("model")
        .and_then(|model| model.as_str())
        .ok_or_else(|| GatewayError::BadRequest("missing model field".to_string()))?
        .to_string();

    let outcome = dispatch_inference(
        &state.broker,
        &state.http,
        &state.dispatch,
        &model,
        body.to_vec(),
    )
    .await?;

    Response::builder()
        .status(StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::BAD_GATEWAY))
        .header("content-type", "application/json")
        .body(outcome.body.into())
        .map_err(|e| GatewayError::Internal(e.to_string()))
}
