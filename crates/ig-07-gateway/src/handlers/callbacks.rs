//! ML worker callbacks for V2 PoC.
//!
//! - `generated`: artifact batches produced during a generation window.
//! - `validated`: statistical verdict over a forwarded sample; turned
//!   into a `validated_weight` and submitted to the chain.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use shared_types::{
    Artifact, BlockHeight, MsgPocValidationsV2, PocValidation,
};
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::router::AppState;

/// `POST /v2/poc-batches/generated` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedBatch {
    /// Stage the artifacts belong to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Artifacts, possibly from several local nodes.
    pub artifacts: Vec<Artifact>,
}

/// `POST /v2/poc-batches/generated` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAck {
    /// Artifacts appended.
    pub accepted: usize,
    /// Artifacts rejected by FP16 admission.
    pub rejected: usize,
}

/// Append generated artifacts into the stage store.
///
/// The whole batch is refused (409) when the stage is outside its
/// generation window; inside the window, individually invalid vectors
/// are dropped and counted while the rest land.
pub async fn generated(
    State(state): State<AppState>,
    Json(batch): Json<GeneratedBatch>,
) -> Result<Json<GeneratedAck>> {
    let stage = batch.poc_stage_start_block_height;
    let mut accepted = 0;
    let mut rejected = 0;

    for artifact in &batch.artifacts {
        match state.stores.append_generated(stage, artifact) {
            Ok(()) => accepted += 1,
            Err(e) if e.is_permanent() => {
                warn!(stage, node = %artifact.node_id, "[ig-07] Artifact rejected: {e}");
                rejected += 1;
            }
            Err(e) => {
                return Err(GatewayError::OutOfWindow(e.to_string()));
            }
        }
    }

    info!(stage, accepted, rejected, "[ig-07] Generated batch processed");
    Ok(Json(GeneratedAck { accepted, rejected }))
}

/// `POST /v2/poc-batches/validated` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedBatch {
    /// Stage the verdict belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Participant the verdict covers.
    pub participant: String,
    /// Statistical total the worker attributes to the participant.
    pub n_total: i64,
    /// Whether the statistical test flagged fraud.
    pub fraud_detected: bool,
}

/// `POST /v2/poc-batches/validated` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedAck {
    /// Weight submitted to the chain.
    pub validated_weight: i64,
}

/// Turn a worker verdict into an on-chain validation.
///
/// `validated_weight = n_total` for a clean, positive result; `-1`
/// otherwise. The chain may still clamp the weight to the committed
/// count on its side.
pub async fn validated(
    State(state): State<AppState>,
    Json(batch): Json<ValidatedBatch>,
) -> Result<Json<ValidatedAck>> {
    let stage = batch.poc_stage_start_block_height;
    let snapshot = state.tracker.snapshot();
    if !snapshot.should_accept_validation(stage) {
        return Err(GatewayError::OutOfWindow(format!(
            "stage {stage} is not in its validation window"
        )));
    }

    let validated_weight = if !batch.fraud_detected && batch.n_total > 0 {
        batch.n_total
    } else {
        -1
    };

    let msg = MsgPocValidationsV2 {
        poc_stage_start_block_height: stage,
        validations: vec![PocValidation {
            participant: batch.participant.clone(),
            validated_weight,
        }],
    };
    state
        .bridge
        .submit_poc_validations_v2(msg)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    info!(
        stage,
        participant = %batch.participant,
        validated_weight,
        "[ig-07] Validation verdict submitted"
    );
    Ok(Json(ValidatedAck { validated_weight }))
}
