//! `POST /v1/poc/proofs`: serve inclusion proofs for our committed store.

use axum::extract::State;
use axum::Json;
use ig_06_validator::{ProofEntry, ProofRequest, ProofResponse};
use shared_types::artifacts::base64_bytes;
use tracing::debug;

use crate::auth::verify_proof_request;
use crate::error::{GatewayError, Result};
use crate::router::AppState;

/// Serve proofs for the requested leaves of a stage store.
///
/// The request must be signed (see [`crate::auth`]) and must reference
/// the store's *current* committed `(root, count)`; a request against an
/// older commit is answered 409 so the validator re-reads the chain.
pub async fn serve_proofs(
    State(state): State<AppState>,
    Json(request): Json<ProofRequest>,
) -> Result<Json<ProofResponse>> {
    let requested_root = verify_proof_request(&request)?;

    let stage = request.poc_stage_start_block_height;
    let store = state
        .stores
        .get(stage)
        .ok_or_else(|| GatewayError::NotFound(format!("stage {stage}")))?;

    if store.count() != request.count || store.root().to_vec() != requested_root {
        return Err(GatewayError::OutOfWindow(format!(
            "commit state advanced past (count {})",
            request.count
        )));
    }

    let mut proofs = Vec::with_capacity(request.leaf_indices.len());
    for &leaf_index in &request.leaf_indices {
        let (artifact, proof) = store.proof_for(leaf_index).map_err(|e| {
            GatewayError::BadRequest(format!("leaf {leaf_index}: {e}"))
        })?;
        proofs.push(ProofEntry {
            leaf_index,
            nonce_value: artifact.nonce,
            vector_bytes: base64_bytes::encode(&artifact.vector),
            proof: proof.iter().map(|hash| base64_bytes::encode(hash)).collect(),
        });
    }

    debug!(
        stage,
        validator = %request.validator_address,
        leaves = proofs.len(),
        "[ig-07] Proofs served"
    );
    Ok(Json(ProofResponse { proofs }))
}
