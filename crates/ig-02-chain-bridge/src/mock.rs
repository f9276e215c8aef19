//! Recording mock bridge.
//!
//! Query responses are configurable; every submission is recorded for
//! later assertion. Used by the commit worker, validator, gateway, and
//! integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use shared_types::{
    BlockHeight, BlockInfo, ChainParams, ConfirmationPocEvent, EpochGroupData, EpochInfo,
    GovernanceModel, MsgHardwareDiff, MsgPocBatch, MsgPocValidation, MsgPocValidationsV2,
    MsgStoreCommit, MsgWeightDistribution, ParticipantInfo, StoreCommitRecord, ValidationSnapshot,
};

use crate::error::{ChainBridgeError, Result};
use crate::phase::epoch_position;
use crate::ports::ChainBridge;

#[derive(Default)]
struct MockQueries {
    params: ChainParams,
    latest_block: BlockInfo,
    block_hashes: HashMap<BlockHeight, String>,
    epoch_groups: HashMap<(BlockHeight, String), EpochGroupData>,
    store_commits: HashMap<BlockHeight, Vec<StoreCommitRecord>>,
    validation_snapshots: HashMap<BlockHeight, ValidationSnapshot>,
    governance_models: Vec<GovernanceModel>,
    participants: HashMap<String, ParticipantInfo>,
    confirmation_event: Option<ConfirmationPocEvent>,
    poc_batches: HashMap<BlockHeight, Vec<(String, MsgPocBatch)>>,
    fail_submissions: bool,
}

/// Recorded submissions, public for assertions.
#[derive(Debug, Default)]
pub struct MockSubmissions {
    /// Hardware diffs, in order.
    pub hardware_diffs: Vec<MsgHardwareDiff>,
    /// Store commits, in order.
    pub store_commits: Vec<MsgStoreCommit>,
    /// Weight distributions, in order.
    pub weight_distributions: Vec<MsgWeightDistribution>,
    /// V2 validation submissions, in order.
    pub poc_validations_v2: Vec<MsgPocValidationsV2>,
    /// V1 batches, in order.
    pub poc_batches: Vec<MsgPocBatch>,
    /// V1 validations, in order.
    pub poc_validations_v1: Vec<MsgPocValidation>,
}

/// Configurable, recording chain bridge mock.
#[derive(Default)]
pub struct MockChainBridge {
    queries: Mutex<MockQueries>,
    submissions: Mutex<MockSubmissions>,
}

impl MockChainBridge {
    /// Fresh mock with default params at height zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parameter bundle.
    pub fn set_params(&self, params: ChainParams) {
        self.queries.lock().expect("mock poisoned").params = params;
    }

    /// Set the chain head.
    pub fn set_latest_block(&self, block: BlockInfo) {
        let mut queries = self.queries.lock().expect("mock poisoned");
        queries.block_hashes.insert(block.height, block.hash.clone());
        queries.latest_block = block;
    }

    /// Register the store commits for a stage.
    pub fn set_store_commits(&self, stage: BlockHeight, commits: Vec<StoreCommitRecord>) {
        self.queries
            .lock()
            .expect("mock poisoned")
            .store_commits
            .insert(stage, commits);
    }

    /// Register the validation snapshot for a stage.
    pub fn set_validation_snapshot(&self, stage: BlockHeight, snapshot: ValidationSnapshot) {
        self.queries
            .lock()
            .expect("mock poisoned")
            .validation_snapshots
            .insert(stage, snapshot);
    }

    /// Register a participant record.
    pub fn set_participant(&self, info: ParticipantInfo) {
        self.queries
            .lock()
            .expect("mock poisoned")
            .participants
            .insert(info.address.clone(), info);
    }

    /// Set the governance model list.
    pub fn set_governance_models(&self, models: Vec<GovernanceModel>) {
        self.queries.lock().expect("mock poisoned").governance_models = models;
    }

    /// Set or clear the active confirmation event.
    pub fn set_confirmation_event(&self, event: Option<ConfirmationPocEvent>) {
        self.queries.lock().expect("mock poisoned").confirmation_event = event;
    }

    /// Register V1 batches for a stage.
    pub fn set_poc_batches(&self, stage: BlockHeight, batches: Vec<(String, MsgPocBatch)>) {
        self.queries
            .lock()
            .expect("mock poisoned")
            .poc_batches
            .insert(stage, batches);
    }

    /// Make every submission fail with a transport error.
    pub fn set_fail_submissions(&self, fail: bool) {
        self.queries.lock().expect("mock poisoned").fail_submissions = fail;
    }

    /// Inspect recorded submissions.
    pub fn submissions(&self) -> std::sync::MutexGuard<'_, MockSubmissions> {
        self.submissions.lock().expect("mock poisoned")
    }

    fn check_submit(&self) -> Result<()> {
        if self.queries.lock().expect("mock poisoned").fail_submissions {
            Err(ChainBridgeError::Transport("mock submission failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainBridge for MockChainBridge {
    async fn params(&self) -> Result<ChainParams> {
        Ok(self.queries.lock().expect("mock poisoned").params.clone())
    }

    async fn current_epoch(&self) -> Result<EpochInfo> {
        let queries = self.queries.lock().expect("mock poisoned");
        let position = epoch_position(queries.latest_block.height, &queries.params.epoch);
        Ok(EpochInfo {
            epoch_index: position.epoch_index,
            poc_start_block_height: position.poc_start_block_height,
        })
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        Ok(self.queries.lock().expect("mock poisoned").latest_block.clone())
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<String> {
        self.queries
            .lock()
            .expect("mock poisoned")
            .block_hashes
            .get(&height)
            .cloned()
            .ok_or_else(|| ChainBridgeError::NotFound(format!("block {height}")))
    }

    async fn epoch_group_by_model(
        &self,
        poc_height: BlockHeight,
        model_id: &str,
    ) -> Result<EpochGroupData> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .epoch_groups
            .get(&(poc_height, model_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn store_commits_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<StoreCommitRecord>> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .store_commits
            .get(&stage_height)
            .cloned()
            .unwrap_or_default())
    }

    async fn validation_snapshot(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Option<ValidationSnapshot>> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .validation_snapshots
            .get(&stage_height)
            .cloned())
    }

    async fn governance_models(&self) -> Result<Vec<GovernanceModel>> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .governance_models
            .clone())
    }

    async fn participant(&self, address: &str) -> Result<ParticipantInfo> {
        self.queries
            .lock()
            .expect("mock poisoned")
            .participants
            .get(address)
            .cloned()
            .ok_or_else(|| ChainBridgeError::NotFound(format!("participant {address}")))
    }

    async fn active_confirmation_event(&self) -> Result<Option<ConfirmationPocEvent>> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .confirmation_event
            .clone())
    }

    async fn poc_batches_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<(String, MsgPocBatch)>> {
        Ok(self
            .queries
            .lock()
            .expect("mock poisoned")
            .poc_batches
            .get(&stage_height)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_hardware_diff(&self, msg: MsgHardwareDiff) -> Result<()> {
        self.check_submit()?;
        self.submissions().hardware_diffs.push(msg);
        Ok(())
    }

    async fn submit_store_commit(&self, msg: MsgStoreCommit) -> Result<()> {
        self.check_submit()?;
        self.submissions().store_commits.push(msg);
        Ok(())
    }

    async fn submit_weight_distribution(&self, msg: MsgWeightDistribution) -> Result<()> {
        self.check_submit()?;
        self.submissions().weight_distributions.push(msg);
        Ok(())
    }

    async fn submit_poc_validations_v2(&self, msg: MsgPocValidationsV2) -> Result<()> {
        self.check_submit()?;
        self.submissions().poc_validations_v2.push(msg);
        Ok(())
    }

    async fn submit_poc_batch(&self, msg: MsgPocBatch) -> Result<()> {
        self.check_submit()?;
        self.submissions().poc_batches.push(msg);
        Ok(())
    }

    async fn submit_poc_validation(&self, msg: MsgPocValidation) -> Result<()> {
        self.check_submit()?;
        self.submissions().poc_validations_v1.push(msg);
        Ok(())
    }
}
