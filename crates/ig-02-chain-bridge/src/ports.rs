//! Capability traits for chain access and message signing.

use async_trait::async_trait;
use shared_types::{
    BlockHeight, BlockInfo, ChainParams, ConfirmationPocEvent, EpochGroupData, EpochInfo,
    MsgHardwareDiff, MsgPocBatch, MsgPocValidation, MsgPocValidationsV2, MsgStoreCommit,
    MsgWeightDistribution, ParticipantInfo, StoreCommitRecord, ValidationSnapshot,
};

use crate::error::Result;

/// Read chain state and submit signed chain messages.
///
/// Queries are read-only; submissions are signed by the node's account key
/// inside the adapter. The chain enforces submission windows; adapters
/// surface rejections as [`crate::ChainBridgeError::Rejected`].
#[async_trait]
pub trait ChainBridge: Send + Sync {
    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current parameter bundle.
    async fn params(&self) -> Result<ChainParams>;

    /// Epoch position of the chain head.
    async fn current_epoch(&self) -> Result<EpochInfo>;

    /// Latest block height and hash.
    async fn latest_block(&self) -> Result<BlockInfo>;

    /// Hash of a specific block (RPC fallback for sampling seeds).
    async fn block_hash(&self, height: BlockHeight) -> Result<String>;

    /// Epoch group data for one model at a PoC stage.
    async fn epoch_group_by_model(
        &self,
        poc_height: BlockHeight,
        model_id: &str,
    ) -> Result<EpochGroupData>;

    /// All V2 store commits recorded for a stage.
    async fn store_commits_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<StoreCommitRecord>>;

    /// Frozen validator-weight snapshot for a stage, if one exists.
    async fn validation_snapshot(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Option<ValidationSnapshot>>;

    /// Governance-approved models.
    async fn governance_models(&self) -> Result<Vec<shared_types::GovernanceModel>>;

    /// Registered participant record.
    async fn participant(&self, address: &str) -> Result<ParticipantInfo>;

    /// The active confirmation PoC event, if any.
    async fn active_confirmation_event(&self) -> Result<Option<ConfirmationPocEvent>>;

    /// V1 batches recorded for a stage, keyed by participant.
    async fn poc_batches_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<(String, MsgPocBatch)>>;

    // -------------------------------------------------------------------------
    // Submissions
    // -------------------------------------------------------------------------

    /// Report a fleet hardware delta.
    async fn submit_hardware_diff(&self, msg: MsgHardwareDiff) -> Result<()>;

    /// Submit a V2 store commit.
    async fn submit_store_commit(&self, msg: MsgStoreCommit) -> Result<()>;

    /// Submit the per-node weight distribution for a stage.
    async fn submit_weight_distribution(&self, msg: MsgWeightDistribution) -> Result<()>;

    /// Submit V2 validation verdicts for a stage.
    async fn submit_poc_validations_v2(&self, msg: MsgPocValidationsV2) -> Result<()>;

    /// Submit a legacy V1 batch.
    async fn submit_poc_batch(&self, msg: MsgPocBatch) -> Result<()>;

    /// Submit a legacy V1 validation.
    async fn submit_poc_validation(&self, msg: MsgPocValidation) -> Result<()>;
}

/// Account key capability: identifies the participant and signs payloads.
pub trait Signer: Send + Sync {
    /// Participant address of this node's account.
    fn address(&self) -> &str;

    /// Account public key, hex encoded (compressed SEC1).
    fn pubkey_hex(&self) -> String;

    /// Sign an arbitrary payload; returns the DER-less raw signature.
    fn sign(&self, payload: &[u8]) -> Vec<u8>;
}
