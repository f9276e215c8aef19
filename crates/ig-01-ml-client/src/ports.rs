//! Capability traits over one ML worker.
//!
//! [`MlNodeClient`] is the full operation set; [`MlClientFactory`] builds a
//! client for a `(poc_url, inference_url)` pair. Consumers hold
//! `Arc<dyn MlClientFactory>` and create clients per request, so workers can
//! be re-addressed between commands without any refresh protocol.
//!
//! Cancellation: callers cancel by dropping the in-flight future (the
//! node workers race every call against their shutdown signal), so no
//! method takes an explicit cancellation token.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    GpuInfo, PocBatchV1, PocGenerateRequestV2, PocInitGenerateV1, PocInitGenerateV2,
    PocInitValidateV1, PowStatus, TrainingStartRequest,
};

/// Typed remote operations on one ML worker node.
#[async_trait]
pub trait MlNodeClient: Send + Sync {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Whether the worker process is up at all.
    async fn health(&self) -> Result<bool>;

    /// Stop all workloads on the worker.
    async fn stop(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // Inference
    // -------------------------------------------------------------------------

    /// Bring the inference server up with a model and merged arguments.
    async fn inference_up(&self, model: &str, args: &[String]) -> Result<()>;

    /// Whether the inference plane is serving.
    async fn inference_health(&self) -> Result<bool>;

    // -------------------------------------------------------------------------
    // PoC v2 (off-chain / MMR)
    // -------------------------------------------------------------------------

    /// Start V2 artifact generation.
    async fn init_generate_v2(&self, req: &PocInitGenerateV2) -> Result<()>;

    /// Recompute sampled artifacts of another participant.
    async fn generate_v2(&self, req: &PocGenerateRequestV2) -> Result<()>;

    /// Current V2 PoC workload status.
    async fn pow_status_v2(&self) -> Result<PowStatus>;

    /// Stop the V2 PoC workload.
    async fn stop_pow_v2(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // PoC v1 (legacy, on-chain)
    // -------------------------------------------------------------------------

    /// Start legacy V1 generation.
    async fn init_generate_v1(&self, req: &PocInitGenerateV1) -> Result<()>;

    /// Put the worker into legacy V1 validation.
    async fn init_validate_v1(&self, req: &PocInitValidateV1) -> Result<()>;

    /// Recompute one sampled legacy batch.
    async fn validate_batch_v1(&self, batch: &PocBatchV1) -> Result<()>;

    /// Current V1 PoC workload status.
    async fn pow_status_v1(&self) -> Result<PowStatus>;

    // -------------------------------------------------------------------------
    // Training
    // -------------------------------------------------------------------------

    /// Join a distributed training task.
    async fn start_training(&self, req: &TrainingStartRequest) -> Result<()>;

    // -------------------------------------------------------------------------
    // Hardware & models
    // -------------------------------------------------------------------------

    /// GPU inventory of the worker.
    async fn gpu_info(&self) -> Result<Vec<GpuInfo>>;

    /// Models available on the worker.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Fetch a model onto the worker.
    async fn download_model(&self, model: &str) -> Result<()>;
}

/// Builds an [`MlNodeClient`] for one worker's URL pair.
pub trait MlClientFactory: Send + Sync {
    /// Create a client for `(poc_url, inference_url)`.
    fn create(&self, poc_url: &str, inference_url: &str) -> Arc<dyn MlNodeClient>;
}
