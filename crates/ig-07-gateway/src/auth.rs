//! Proof-request authentication.
//!
//! The validator signed the canonical digest of its request fields; we
//! recompute the digest from the same fields and verify the signature
//! against the pubkey carried in the request. Stale timestamps are
//! rejected to bound replays: the digest binds the timestamp, so a
//! replayed request ages out.

use std::time::{SystemTime, UNIX_EPOCH};

use ig_02_chain_bridge::verify_signature;
use ig_06_validator::{canonical_request_digest, ProofRequest};
use shared_types::artifacts::base64_bytes;

use crate::error::{GatewayError, Result};

/// Maximum accepted clock skew for proof requests.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 600;

/// Verify a proof request's signature and freshness. Returns the decoded
/// committed root on success.
pub fn verify_proof_request(request: &ProofRequest) -> Result<Vec<u8>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if now.abs_diff(request.timestamp) > MAX_TIMESTAMP_SKEW_SECS {
        return Err(GatewayError::Unauthorized(format!(
            "stale timestamp {}",
            request.timestamp
        )));
    }

    let root_hash = base64_bytes::decode(&request.root_hash)
        .ok_or_else(|| GatewayError::BadRequest("undecodable root hash".to_string()))?;

    let digest = canonical_request_digest(
        request.poc_stage_start_block_height,
        &root_hash,
        request.count,
        &request.leaf_indices,
        request.timestamp,
        &request.validator_address,
        &request.signer_address,
    );
    let signature = hex::decode(&request.signature_hex)
        .map_err(|_| GatewayError::Unauthorized("undecodable signature".to_string()))?;

    if !verify_signature(&request.signer_pubkey_hex, digest.as_bytes(), &signature) {
        return Err(GatewayError::Unauthorized("signature mismatch".to_string()));
    }
    Ok(root_hash)
}
