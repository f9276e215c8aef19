//! Wire payloads of the ML worker HTTP API.
//!
//! The worker API is versioned by path; payloads here mirror the JSON the
//! workers accept. Only fields the node actually drives are modeled; the
//! worker API has more surface than the node consumes.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, StatTestParams, VerifiedArtifact};

/// PoC model parameters shared by init and generate requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocModelParams {
    /// Model identifier for the PoC workload.
    pub model: String,
    /// Sequence length for the workload.
    pub seq_len: u32,
}

/// `POST /api/v1/inference/pow/init/generate`: start V2 PoC generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocInitGenerateV2 {
    /// Seed block hash of the stage.
    pub block_hash: String,
    /// Stage start height.
    pub block_height: BlockHeight,
    /// Participant account pubkey, hex encoded.
    pub public_key: String,
    /// This worker's registration number within the fleet.
    pub node_id: u64,
    /// Total participating workers in the fleet.
    pub node_count: u32,
    /// Model parameters.
    pub params: PocModelParams,
    /// Callback URL for generated artifact batches.
    pub url: String,
}

/// Validation payload inside a V2 generate request: the sampled artifacts
/// the worker must statistically re-check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PocValidationPayload {
    /// Proof-verified sampled artifacts.
    pub artifacts: Vec<VerifiedArtifact>,
}

/// `POST /api/v1/inference/pow/generate`: recompute sampled artifacts for
/// validation of another participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocGenerateRequestV2 {
    /// Generation seed hash of the validated stage (NOT the sampling hash).
    pub block_hash: String,
    /// Stage start height.
    pub block_height: BlockHeight,
    /// Pubkey of the participant under validation.
    pub public_key: String,
    /// Worker count the participant committed for the stage.
    pub node_count: u32,
    /// Sampled nonces to recompute.
    pub nonces: Vec<i32>,
    /// Model parameters.
    pub params: PocModelParams,
    /// Callback URL for the validation verdict.
    pub url: String,
    /// Verified artifacts the recomputation is checked against.
    pub validation: PocValidationPayload,
    /// Statistical test configuration.
    pub stat_test: StatTestParams,
}

/// `GET /api/v1/inference/pow/status` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowStatus {
    /// No PoC workload active.
    Idle,
    /// Model weights loading.
    Loading,
    /// Generating artifacts.
    Generating,
    /// Validating sampled artifacts.
    Validating,
    /// Workload stopped.
    Stopped,
}

/// Status envelope returned by both PoC status routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowStatusResponse {
    /// Current PoC workload status.
    pub status: PowStatus,
}

/// `POST /api/v1/pow/init/generate`: start legacy V1 generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocInitGenerateV1 {
    /// Seed block hash of the stage.
    pub block_hash: String,
    /// Stage start height.
    pub block_height: BlockHeight,
    /// Participant account pubkey, hex encoded.
    pub public_key: String,
    /// Model parameters.
    pub params: PocModelParams,
}

/// `POST /api/v1/pow/init/validate`: put the worker into V1 validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocInitValidateV1 {
    /// Seed block hash of the stage.
    pub block_hash: String,
    /// Stage start height.
    pub block_height: BlockHeight,
    /// Model parameters.
    pub params: PocModelParams,
}

/// `POST /api/v1/pow/validate`: one sampled V1 batch to recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocBatchV1 {
    /// Pubkey of the participant under validation.
    pub public_key: String,
    /// Stage start height.
    pub block_height: BlockHeight,
    /// Sampled nonces.
    pub nonces: Vec<i64>,
    /// Claimed distances matching `nonces` index-wise.
    pub dist: Vec<f64>,
}

/// `POST /api/v1/inference/up`: bring the inference server up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceUpRequest {
    /// Model to serve.
    pub model: String,
    /// Merged invocation arguments (epoch args overridden by local args).
    pub args: Vec<String>,
}

/// `POST /api/v1/train/start`: join a distributed training task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStartRequest {
    /// Task identifier on the chain.
    pub task_id: u64,
    /// Rendezvous address of the training master.
    pub master_addr: String,
    /// This worker's rank.
    pub rank: u32,
    /// Total world size.
    pub world_size: u32,
}

/// One GPU as reported by `GET /api/v1/gpu`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// Device model string.
    pub model: String,
    /// Total memory in MiB.
    pub memory_mib: u64,
}

/// `GET /api/v1/health` / `GET /api/v1/inference/health` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Whether the queried plane is serving.
    pub healthy: bool,
}
