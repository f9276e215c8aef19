//! Proof fetching and verification against a participant's API.
//!
//! The request is authenticated by a canonical digest signed with the
//! validator's account key; the serving side recomputes the digest from
//! the same fields. Responses must cover exactly the requested leaves
//! (no omissions, duplicates, or extras) and every proof must verify
//! against the committed `(root, count)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ig_02_chain_bridge::Signer;
use ig_03_artifact_store::{validate_fp16_vector, verify_proof};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::artifacts::base64_bytes;
use shared_types::{BlockHeight, VerifiedArtifact};
use tracing::debug;

use crate::error::{Result, ValidationError};

/// Default timeout for proof requests.
pub const DEFAULT_PROOF_TIMEOUT: Duration = Duration::from_secs(20);

/// What to fetch from one participant.
#[derive(Debug, Clone)]
pub struct ProofQuery {
    /// Stage under validation.
    pub stage_height: BlockHeight,
    /// Committed root.
    pub root_hash: Vec<u8>,
    /// Committed leaf count.
    pub count: u32,
    /// Sampled leaf indices.
    pub leaf_indices: Vec<u32>,
    /// Participant under validation.
    pub participant_address: String,
}

/// `POST {inference_url}/v1/poc/proofs` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRequest {
    /// Stage under validation.
    pub poc_stage_start_block_height: BlockHeight,
    /// Committed root, base64.
    pub root_hash: String,
    /// Committed leaf count.
    pub count: u32,
    /// Sampled leaf indices.
    pub leaf_indices: Vec<u32>,
    /// Participant under validation.
    pub participant_address: String,
    /// Requesting validator account.
    pub validator_address: String,
    /// Account that produced the signature.
    pub signer_address: String,
    /// Unix seconds at signing time.
    pub timestamp: u64,
    /// Signer pubkey, hex.
    pub signer_pubkey_hex: String,
    /// Signature over the canonical digest, hex.
    pub signature_hex: String,
}

/// One proof entry in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofEntry {
    /// Leaf index the proof covers.
    pub leaf_index: u32,
    /// Claimed nonce of the leaf.
    pub nonce_value: i32,
    /// Leaf vector, base64.
    pub vector_bytes: String,
    /// Sibling/peak hashes, base64.
    pub proof: Vec<String>,
}

/// `POST {inference_url}/v1/poc/proofs` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofResponse {
    /// Proofs in response order (order is not significant).
    pub proofs: Vec<ProofEntry>,
}

/// Canonical request digest, hex encoded:
/// `SHA256(stage LE64 || root || count LE32 || ∀idx LE32 || timestamp LE64
/// || validator_address || signer_address)`.
pub fn canonical_request_digest(
    stage_height: BlockHeight,
    root_hash: &[u8],
    count: u32,
    leaf_indices: &[u32],
    timestamp: u64,
    validator_address: &str,
    signer_address: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stage_height.to_le_bytes());
    hasher.update(root_hash);
    hasher.update(count.to_le_bytes());
    for index in leaf_indices {
        hasher.update(index.to_le_bytes());
    }
    hasher.update(timestamp.to_le_bytes());
    hasher.update(validator_address.as_bytes());
    hasher.update(signer_address.as_bytes());
    hex::encode(hasher.finalize())
}

/// Exact coverage check: the response leaves must equal the requested set
/// as a multiset (permutation-invariant, no duplicates, no extras).
pub fn validate_leaf_coverage(requested: &[u32], received: &[u32]) -> Result<()> {
    if requested.len() != received.len() {
        return Err(ValidationError::IncompleteCoverage(format!(
            "expected {} proofs, got {}",
            requested.len(),
            received.len()
        )));
    }

    let mut expected: HashMap<u32, u32> = HashMap::new();
    for index in requested {
        *expected.entry(*index).or_insert(0) += 1;
    }
    for index in received {
        match expected.get_mut(index) {
            Some(remaining) if *remaining > 0 => *remaining -= 1,
            _ => {
                return Err(ValidationError::IncompleteCoverage(format!(
                    "unexpected or duplicate leaf index {index}"
                )))
            }
        }
    }
    Ok(())
}

/// Fraud check: every verified artifact must carry a distinct nonce.
pub fn check_duplicate_nonces(artifacts: &[VerifiedArtifact]) -> Result<()> {
    let mut seen: HashMap<i32, u32> = HashMap::new();
    for artifact in artifacts {
        if let Some(first_leaf) = seen.get(&artifact.nonce) {
            return Err(ValidationError::DuplicateNonces {
                nonce: artifact.nonce,
                first_leaf: *first_leaf,
                second_leaf: artifact.leaf_index,
            });
        }
        seen.insert(artifact.nonce, artifact.leaf_index);
    }
    Ok(())
}

/// Verify one decoded response against a query: coverage, FP16, MMR.
pub fn verify_response(query: &ProofQuery, response: &ProofResponse) -> Result<Vec<VerifiedArtifact>> {
    let received: Vec<u32> = response.proofs.iter().map(|p| p.leaf_index).collect();
    validate_leaf_coverage(&query.leaf_indices, &received)?;

    let root: [u8; 32] = query
        .root_hash
        .as_slice()
        .try_into()
        .map_err(|_| ValidationError::ProofVerificationFailed { leaf_index: 0 })?;

    let mut artifacts = Vec::with_capacity(response.proofs.len());
    for entry in &response.proofs {
        let vector = base64_bytes::decode(&entry.vector_bytes).ok_or(
            ValidationError::ProofVerificationFailed {
                leaf_index: entry.leaf_index,
            },
        )?;
        validate_fp16_vector(&vector)?;

        let mut proof_hashes = Vec::with_capacity(entry.proof.len());
        for hash in &entry.proof {
            let bytes = base64_bytes::decode(hash).ok_or(
                ValidationError::ProofVerificationFailed {
                    leaf_index: entry.leaf_index,
                },
            )?;
            let hash: [u8; 32] =
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| ValidationError::ProofVerificationFailed {
                        leaf_index: entry.leaf_index,
                    })?;
            proof_hashes.push(hash);
        }

        let mut leaf_data = Vec::with_capacity(4 + vector.len());
        leaf_data.extend_from_slice(&entry.nonce_value.to_le_bytes());
        leaf_data.extend_from_slice(&vector);

        if !verify_proof(&root, query.count, entry.leaf_index, &leaf_data, &proof_hashes) {
            return Err(ValidationError::ProofVerificationFailed {
                leaf_index: entry.leaf_index,
            });
        }

        artifacts.push(VerifiedArtifact {
            leaf_index: entry.leaf_index,
            nonce: entry.nonce_value,
            vector,
        });
    }
    Ok(artifacts)
}

/// Capability to fetch and verify proofs from one participant.
#[async_trait]
pub trait ProofProvider: Send + Sync {
    /// Fetch proofs for a query from `participant_url` and verify them.
    async fn fetch_and_verify(
        &self,
        participant_url: &str,
        query: &ProofQuery,
    ) -> Result<Vec<VerifiedArtifact>>;
}

/// Production provider: signed JSON POST via reqwest.
pub struct HttpProofFetcher {
    http: reqwest::Client,
    signer: Arc<dyn Signer>,
    timeout: Duration,
}

impl HttpProofFetcher {
    /// Provider signing with the node's account key.
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            signer,
            timeout: DEFAULT_PROOF_TIMEOUT,
        }
    }

    fn build_request(&self, query: &ProofQuery) -> ProofRequest {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let digest = canonical_request_digest(
            query.stage_height,
            &query.root_hash,
            query.count,
            &query.leaf_indices,
            timestamp,
            self.signer.address(),
            self.signer.address(),
        );
        let signature = self.signer.sign(digest.as_bytes());

        ProofRequest {
            poc_stage_start_block_height: query.stage_height,
            root_hash: base64_bytes::encode(&query.root_hash),
            count: query.count,
            leaf_indices: query.leaf_indices.clone(),
            participant_address: query.participant_address.clone(),
            validator_address: self.signer.address().to_string(),
            signer_address: self.signer.address().to_string(),
            timestamp,
            signer_pubkey_hex: self.signer.pubkey_hex(),
            signature_hex: hex::encode(signature),
        }
    }
}

#[async_trait]
impl ProofProvider for HttpProofFetcher {
    async fn fetch_and_verify(
        &self,
        participant_url: &str,
        query: &ProofQuery,
    ) -> Result<Vec<VerifiedArtifact>> {
        let url = format!("{}/v1/poc/proofs", participant_url.trim_end_matches('/'));
        debug!(%url, leaves = query.leaf_indices.len(), "[ig-06] Fetching proofs");

        let request = self.build_request(query);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ValidationError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidationError::Transport(format!("{url}: status {status}")));
        }
        let response: ProofResponse = response
            .json()
            .await
            .map_err(|e| ValidationError::Transport(format!("{url}: decode: {e}")))?;

        verify_response(query, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_03_artifact_store::StageStore;
    use shared_types::VECTOR_BYTES;

    fn vector(fill: u8) -> Vec<u8> {
        vec![fill & 0x3F; VECTOR_BYTES]
    }

    fn committed_store() -> (StageStore, ProofQuery) {
        let store = StageStore::new(100);
        for nonce in 0..16 {
            store
                .add_with_node(nonce, vector(nonce as u8), "node1")
                .unwrap();
        }
        store.flush();
        let snapshot = store.snapshot();
        let query = ProofQuery {
            stage_height: 100,
            root_hash: snapshot.root.to_vec(),
            count: snapshot.count,
            leaf_indices: vec![0, 5, 10],
            participant_address: "grid1p".to_string(),
        };
        (store, query)
    }

    fn response_for(store: &StageStore, indices: &[u32]) -> ProofResponse {
        let proofs = indices
            .iter()
            .map(|&index| {
                let (artifact, proof) = store.proof_for(index).unwrap();
                ProofEntry {
                    leaf_index: index,
                    nonce_value: artifact.nonce,
                    vector_bytes: base64_bytes::encode(&artifact.vector),
                    proof: proof.iter().map(|h| base64_bytes::encode(h)).collect(),
                }
            })
            .collect();
        ProofResponse { proofs }
    }

    #[test]
    fn test_valid_response_verifies() {
        let (store, query) = committed_store();
        let response = response_for(&store, &[0, 5, 10]);
        let artifacts = verify_response(&query, &response).unwrap();
        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts[1].leaf_index, 5);
        assert_eq!(artifacts[1].nonce, 5);
    }

    #[test]
    fn test_coverage_is_permutation_invariant() {
        let (store, query) = committed_store();
        let response = response_for(&store, &[10, 0, 5]);
        assert!(verify_response(&query, &response).is_ok());
    }

    #[test]
    fn test_missing_proof_is_incomplete_coverage() {
        let (store, query) = committed_store();
        let response = response_for(&store, &[0, 5]);
        let err = verify_response(&query, &response).unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("expected 3 proofs, got 2"));
    }

    #[test]
    fn test_duplicate_and_extra_leaves_rejected() {
        let (store, query) = committed_store();
        let response = response_for(&store, &[0, 5, 5]);
        let err = verify_response(&query, &response).unwrap_err();
        assert!(matches!(err, ValidationError::IncompleteCoverage(_)));

        let response = response_for(&store, &[0, 5, 11]);
        let err = verify_response(&query, &response).unwrap_err();
        assert!(err.to_string().contains("unexpected or duplicate leaf index 11"));
    }

    #[test]
    fn test_tampered_vector_fails_proof() {
        let (store, query) = committed_store();
        let mut response = response_for(&store, &[0, 5, 10]);
        response.proofs[1].vector_bytes = base64_bytes::encode(&vector(0x3E));
        let err = verify_response(&query, &response).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ProofVerificationFailed { leaf_index: 5 }
        ));
    }

    #[test]
    fn test_nan_vector_is_invalid_vector_data() {
        let (store, query) = committed_store();
        let mut response = response_for(&store, &[0, 5, 10]);
        let mut bad = vector(1);
        bad[3] = 0x7E; // second halfword becomes a NaN
        response.proofs[0].vector_bytes = base64_bytes::encode(&bad);
        let err = verify_response(&query, &response).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidVectorData(_)));
    }

    #[test]
    fn test_duplicate_nonce_detection() {
        let artifacts = vec![
            VerifiedArtifact {
                leaf_index: 1,
                nonce: 7,
                vector: vector(1),
            },
            VerifiedArtifact {
                leaf_index: 4,
                nonce: 9,
                vector: vector(2),
            },
            VerifiedArtifact {
                leaf_index: 9,
                nonce: 7,
                vector: vector(3),
            },
        ];
        let err = check_duplicate_nonces(&artifacts).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DuplicateNonces {
                nonce: 7,
                first_leaf: 1,
                second_leaf: 9
            }
        ));

        assert!(check_duplicate_nonces(&artifacts[..2]).is_ok());
    }

    #[test]
    fn test_canonical_digest_is_stable_and_field_sensitive() {
        let digest = canonical_request_digest(100, &[1; 32], 16, &[0, 5, 10], 1700000000, "v", "s");
        assert_eq!(
            digest,
            canonical_request_digest(100, &[1; 32], 16, &[0, 5, 10], 1700000000, "v", "s")
        );
        assert_ne!(
            digest,
            canonical_request_digest(100, &[1; 32], 16, &[0, 5, 11], 1700000000, "v", "s")
        );
        assert_ne!(
            digest,
            canonical_request_digest(100, &[1; 32], 16, &[0, 5, 10], 1700000001, "v", "s")
        );
        assert_eq!(digest.len(), 64);
    }
}
