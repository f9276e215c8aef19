//! # PoC Validator Subsystem
//!
//! When a stage enters validation, the orchestrator picks a protocol
//! variant from the chain flags and validates every assigned participant:
//!
//! - **V2 (off-chain / MMR)**: sample leaves deterministically, fetch
//!   inclusion proofs from the participant's API, verify them against the
//!   committed `(root, count)`, reject fraud (bad vectors, duplicate
//!   nonces, wrong/missing proofs), and forward the verified sample to a
//!   local ML node for statistical recomputation.
//! - **V1 (legacy, on-chain)**: read nonce/distance batches from the
//!   chain, sample them with the same RNG, and forward to a local node.
//!
//! Work is drained by a small worker pool over a buffered queue. Retry
//! delays are per-item `retry_after` timestamps; items not yet due are
//! pushed back to the tail, so no second scheduler exists. Permanent
//! failures (cryptographic/fraud classes) submit an invalidity verdict
//! (`validated_weight = -1`) and stop retrying for the stage.

pub mod error;
pub mod fleet;
pub mod offchain;
pub mod onchain;
pub mod orchestrator;
pub mod proofs;
pub mod sampling;
pub mod slots;

pub use error::ValidationError;
pub use fleet::{filter_for_validation, get_nodes_with_retry};
pub use offchain::{OffChainConfig, OffChainValidator, StageStats};
pub use onchain::{OnChainConfig, OnChainValidator};
pub use orchestrator::{Orchestrator, Variant};
pub use proofs::{
    canonical_request_digest, validate_leaf_coverage, HttpProofFetcher, ProofEntry,
    ProofProvider, ProofQuery, ProofRequest, ProofResponse,
};
pub use sampling::sample_leaf_indices;
pub use slots::assigned_validators;
