//! # Chain Submission Messages
//!
//! Typed payloads the node submits to the chain through the bridge. The
//! chain enforces submission windows on its side; the node additionally
//! gates locally via the [`crate::phases::PhaseSnapshot`] predicates so
//! out-of-window submissions are not even attempted.

use serde::{Deserialize, Serialize};

use crate::artifacts::NodeDistribution;
use crate::entities::HardwareDescriptor;
use crate::BlockHeight;

/// V2 store commit: the MMR snapshot of one participant's stage store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStoreCommit {
    /// Stage the commit belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// MMR root after the last flush.
    #[serde(with = "crate::artifacts::base64_bytes")]
    pub root_hash: Vec<u8>,
    /// Leaf count after the last flush.
    pub count: u32,
    /// Per-node artifact counts, sorted by node id.
    pub per_node_distribution: NodeDistribution,
}

/// One node's share of the scaled weight distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    /// Local node id.
    pub node_id: String,
    /// Scaled weight.
    pub weight: u32,
}

/// Weight distribution across the participant's local nodes for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWeightDistribution {
    /// Stage the distribution belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Scaled weights summing exactly to the target count.
    pub weights: Vec<WeightEntry>,
}

/// One validation verdict over a participant. `validated_weight <= 0`
/// signals an invalid participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocValidation {
    /// Validated participant address.
    pub participant: String,
    /// Statistical weight granted, or a non-positive sentinel.
    pub validated_weight: i64,
}

/// V2 validation submission for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgPocValidationsV2 {
    /// Stage the validations belong to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Verdicts, one per participant.
    pub validations: Vec<PocValidation>,
}

/// V1 (legacy) batch submission: nonces and distances produced on-chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgPocBatch {
    /// Stage the batch belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Produced nonces.
    pub nonces: Vec<i64>,
    /// Distances matching `nonces` index-wise.
    pub dist: Vec<f64>,
}

/// V1 (legacy) validation submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgPocValidation {
    /// Stage the validation belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Validated participant address.
    pub participant: String,
    /// Fraud threshold probability observed.
    pub fraud_threshold: f64,
    /// Number of mismatched samples.
    pub n_invalid: u64,
}

/// Hardware entry inside a diff: one node's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareNode {
    /// Local node id.
    pub node_id: String,
    /// Hardware inventory of the node.
    pub hardware: Vec<HardwareDescriptor>,
}

/// Fleet delta reported to the chain on registration changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MsgHardwareDiff {
    /// Nodes added since the last report.
    pub added: Vec<HardwareNode>,
    /// Nodes removed since the last report.
    pub removed: Vec<HardwareNode>,
}

impl MsgHardwareDiff {
    /// True when the diff carries no change.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
