//! # Chain Parameter Groups
//!
//! Read-only parameter structures queried from the chain. The node never
//! defines these values; it consumes them and must tolerate zero/missing
//! entries (defaults are applied at the point of use, e.g. a zero
//! `validation_sample_size` falls back to 200 inside the validator).

use serde::{Deserialize, Serialize};

use crate::BlockHeight;

/// Statistical test parameters applied by local ML nodes when validating
/// sampled artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatTestParams {
    /// Maximum allowed distance between claimed and recomputed vectors.
    pub dist_threshold: f64,
    /// Expected per-artifact mismatch probability under honest compute.
    pub p_mismatch: f64,
    /// p-value below which the sample is declared fraudulent.
    pub p_value_threshold: f64,
}

impl Default for StatTestParams {
    fn default() -> Self {
        Self {
            dist_threshold: 0.01,
            p_mismatch: 0.05,
            p_value_threshold: 0.001,
        }
    }
}

/// PoC protocol parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocParams {
    /// Leaves sampled per participant per stage. Zero means "use default".
    pub validation_sample_size: u32,
    /// Number of validator slots assigned per commit; zero disables slot
    /// assignment (every validator validates every commit).
    pub validation_slots: u32,
    /// Model used for PoC generation this epoch.
    pub model_id: String,
    /// Sequence length for PoC generation.
    pub seq_len: u32,
    /// Statistical test configuration.
    pub stat_test: StatTestParams,
    /// Per-cent scale applied to committed counts when deriving the weight
    /// distribution target.
    pub weight_scale_factor: u32,
    /// The V2 (off-chain/MMR) protocol is active for regular stages.
    pub poc_v2_enabled: bool,
    /// Confirmation events use the V2 protocol.
    pub confirmation_poc_v2_enabled: bool,
}

impl Default for PocParams {
    fn default() -> Self {
        Self {
            validation_sample_size: 0,
            validation_slots: 0,
            model_id: String::new(),
            seq_len: 0,
            stat_test: StatTestParams::default(),
            weight_scale_factor: 100,
            poc_v2_enabled: false,
            confirmation_poc_v2_enabled: false,
        }
    }
}

/// Epoch timing parameters, all expressed in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochParams {
    /// Length of one epoch.
    pub epoch_length: BlockHeight,
    /// Offset of epoch boundaries from height zero.
    pub epoch_shift: BlockHeight,
    /// Length of the PoC generation window.
    pub poc_stage_duration: BlockHeight,
    /// Length of the commit exchange tail after generation stops.
    pub poc_exchange_duration: BlockHeight,
    /// Gap between the exchange window and validation start.
    pub poc_validation_delay: BlockHeight,
    /// Length of the validation window.
    pub poc_validation_duration: BlockHeight,
    /// Cutoff for inference validation submissions within the epoch.
    pub inference_validation_cutoff: BlockHeight,
    /// Blocks reserved for forming the next validator set.
    pub set_new_validators_delay: BlockHeight,
}

impl Default for EpochParams {
    fn default() -> Self {
        Self {
            epoch_length: 720,
            epoch_shift: 0,
            poc_stage_duration: 60,
            poc_exchange_duration: 20,
            poc_validation_delay: 10,
            poc_validation_duration: 60,
            inference_validation_cutoff: 600,
            set_new_validators_delay: 20,
        }
    }
}

/// Top-level parameter bundle returned by the chain `Params` query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainParams {
    /// PoC protocol parameters.
    pub poc: PocParams,
    /// Epoch timing parameters.
    pub epoch: EpochParams,
}

/// A governance-approved model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceModel {
    /// Model identifier.
    pub id: String,
    /// Epoch-level invocation arguments for the model.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Per-member ML node info inside an epoch group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlNodeInfo {
    /// Node identifier local to the owning participant.
    pub node_id: String,
    /// PoC weight attributed to the node.
    pub poc_weight: u64,
}

/// One validator's weight entry in an epoch group or validation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorWeight {
    /// Participant address of the validator.
    pub address: String,
    /// Consensus weight.
    pub weight: i64,
    /// The validator's registered ML nodes.
    #[serde(default)]
    pub ml_nodes: Vec<MlNodeInfo>,
}

/// Epoch group data for one model: which members serve it and with what
/// validation weights.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpochGroupData {
    /// Model this group serves; empty for the root group.
    pub model_id: String,
    /// Validation weights of the group members.
    pub validation_weights: Vec<ValidatorWeight>,
}

/// Snapshot of validator weights frozen for a stage's slot assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSnapshot {
    /// App hash sealing the snapshot; seeds the slot function.
    pub app_hash: String,
    /// Sorted validator weight table.
    pub validator_weights: Vec<ValidatorWeight>,
}

/// Registered participant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Participant address.
    pub address: String,
    /// Public inference/API URL of the participant's node.
    pub inference_url: String,
}

/// Epoch position of the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    /// Current epoch index.
    pub epoch_index: u64,
    /// Height at which the epoch's PoC generation began.
    pub poc_start_block_height: BlockHeight,
}

/// Minimal head-of-chain view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: BlockHeight,
    /// Block hash, hex encoded.
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let params = ChainParams::default();
        assert_eq!(params.poc.validation_sample_size, 0);
        assert_eq!(params.poc.weight_scale_factor, 100);
        // Phase segments must fit inside one epoch.
        let e = params.epoch;
        assert!(
            e.poc_stage_duration
                + e.poc_exchange_duration
                + e.poc_validation_delay
                + e.poc_validation_duration
                + e.set_new_validators_delay
                <= e.epoch_length
        );
    }
}
