//! # Core Domain Entities
//!
//! The fleet-side entities of the API node: ML worker node identity and
//! configuration, hardware/PoC status machines, administrative state, and
//! the read-only snapshots handed across subsystem boundaries.
//!
//! ## Clusters
//!
//! - **Identity & Configuration**: [`MlNodeConfig`], [`ModelSpec`],
//!   [`HardwareDescriptor`]
//! - **Lifecycle**: [`HardwareStatus`], [`PocStatus`], [`NodeState`]
//! - **Administration**: [`AdminState`]
//! - **Snapshots**: [`MlNode`], [`NodeSnapshot`]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::phases::EpochPhase;
use crate::EpochIndex;

// =============================================================================
// CLUSTER A: IDENTITY & CONFIGURATION
// =============================================================================

/// A model the node can serve, with its per-model invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier as registered in governance.
    pub id: String,
    /// Extra invocation arguments passed to the worker when bringing this
    /// model up. Local arguments override epoch-assigned ones.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Coarse hardware descriptor reported to the chain in hardware diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDescriptor {
    /// Device type, e.g. `"NVIDIA H100"`.
    pub device: String,
    /// Number of devices of this type.
    pub count: u32,
}

/// Static configuration of one ML worker node.
///
/// Validated by the broker on registration and update; see the uniqueness
/// rules on the broker command set. The configuration is immutable from the
/// worker's point of view; only the broker rewrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlNodeConfig {
    /// Stable node identifier, unique across the fleet.
    pub id: String,
    /// Host name or address, shared by both ports.
    pub host: String,
    /// Port of the inference API.
    pub inference_port: u16,
    /// Port of the PoC API.
    pub poc_port: u16,
    /// Optional path segment appended to the inference authority,
    /// e.g. `"/api/v1"`.
    #[serde(default)]
    pub inference_segment: String,
    /// Optional path segment appended to the PoC authority.
    #[serde(default)]
    pub poc_segment: String,
    /// Maximum number of simultaneously served inference requests.
    pub max_concurrent: u32,
    /// Models this node declares, with local invocation arguments.
    pub models: Vec<ModelSpec>,
    /// Hardware inventory, reported in hardware diffs.
    #[serde(default)]
    pub hardware: Vec<HardwareDescriptor>,
}

impl MlNodeConfig {
    /// Base URL of the inference API: `http://{host}:{port}{segment}`.
    pub fn inference_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.host, self.inference_port, self.inference_segment
        )
    }

    /// Versioned inference URL. Inserts `/{version}` after the authority
    /// iff `version` is non-empty: `http://{host}:{port}/{version}{segment}`.
    pub fn inference_url_with_version(&self, version: &str) -> String {
        if version.is_empty() {
            return self.inference_url();
        }
        format!(
            "http://{}:{}/{}{}",
            self.host, self.inference_port, version, self.inference_segment
        )
    }

    /// Base URL of the PoC API, symmetric with [`Self::inference_url`].
    pub fn poc_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.poc_port, self.poc_segment)
    }

    /// Versioned PoC URL, symmetric with [`Self::inference_url_with_version`].
    pub fn poc_url_with_version(&self, version: &str) -> String {
        if version.is_empty() {
            return self.poc_url();
        }
        format!(
            "http://{}:{}/{}{}",
            self.host, self.poc_port, version, self.poc_segment
        )
    }

    /// Whether this node declares the given model.
    pub fn declares_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.id == model)
    }

    /// Local invocation arguments for a model, if declared.
    pub fn model_args(&self, model: &str) -> Option<&[String]> {
        self.models
            .iter()
            .find(|m| m.id == model)
            .map(|m| m.args.as_slice())
    }
}

// =============================================================================
// CLUSTER B: LIFECYCLE
// =============================================================================

/// Coarse hardware status of one ML worker.
///
/// `current` values reflect the last observed/achieved state; `intended`
/// values reflect the reconciler's goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardwareStatus {
    /// Never observed, or observation failed.
    Unknown,
    /// Serving inference traffic.
    Inference,
    /// Participating in a PoC stage.
    Poc,
    /// Running a training task.
    Training,
    /// Deliberately stopped.
    Stopped,
    /// Last command against the node failed.
    Failed,
}

/// PoC sub-status of one ML worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PocStatus {
    /// Not participating in PoC.
    Idle,
    /// Producing artifacts for the current stage.
    Generating,
    /// Validating other participants' artifacts.
    Validating,
}

/// Mutable lifecycle state of one node, owned exclusively by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// Last observed/achieved hardware status.
    pub current_status: HardwareStatus,
    /// Last observed/achieved PoC sub-status.
    pub current_poc_status: PocStatus,
    /// Reconciler goal for the hardware status.
    pub intended_status: HardwareStatus,
    /// Reconciler goal for the PoC sub-status.
    pub intended_poc_status: PocStatus,
    /// Models assigned to this node by the current epoch.
    pub epoch_models: BTreeSet<String>,
    /// Node is reserved through the next PoC for inference continuity and
    /// must not be used for PoC generation.
    pub should_continue_inference: bool,
    /// Error message of the last failed command, if any.
    pub failure: Option<String>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            current_status: HardwareStatus::Unknown,
            current_poc_status: PocStatus::Idle,
            intended_status: HardwareStatus::Unknown,
            intended_poc_status: PocStatus::Idle,
            epoch_models: BTreeSet::new(),
            should_continue_inference: false,
            failure: None,
        }
    }
}

// =============================================================================
// CLUSTER C: ADMINISTRATION
// =============================================================================

/// Administrative state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminState {
    /// Operator intent: participate in the network.
    pub enabled: bool,
    /// Epoch at which the current `enabled` value takes full effect.
    pub effective_epoch: EpochIndex,
}

impl AdminState {
    /// Admission rule for serving inference traffic.
    ///
    /// Enabled nodes are operational only during the `Inference` phase (the
    /// other phases belong to PoC and validation). A freshly disabled node
    /// keeps serving in all phases for the remainder of its effective epoch
    /// (grace), and is not operational afterwards.
    pub fn should_be_operational(&self, current_epoch: EpochIndex, phase: EpochPhase) -> bool {
        if self.enabled {
            phase == EpochPhase::Inference
        } else {
            current_epoch == self.effective_epoch
        }
    }
}

// =============================================================================
// CLUSTER D: SNAPSHOTS
// =============================================================================

/// A registered node as owned by the broker: configuration plus the
/// broker-assigned registration number and administrative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlNode {
    /// Static configuration (validated).
    pub config: MlNodeConfig,
    /// Monotone registration number; assigned at first registration and
    /// preserved across updates.
    pub node_num: u64,
    /// Administrative state.
    pub admin: AdminState,
}

/// Read-only snapshot of one node, materialized by the broker for readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Registered node.
    pub node: MlNode,
    /// Lifecycle state at snapshot time.
    pub state: NodeState,
    /// Outstanding inference locks at snapshot time.
    pub locks_in_use: u32,
}

/// A distributed training task fanned out to the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingTask {
    /// Task identifier on the chain.
    pub task_id: u64,
    /// Owning participant address.
    pub participant: String,
    /// Rendezvous address of the training master.
    pub master_addr: String,
    /// Rank assignment per node id.
    pub node_ranks: Vec<(String, u32)>,
    /// Total world size across all participants.
    pub world_size: u32,
}

impl TrainingTask {
    /// Rank assigned to a node, if the task includes it.
    pub fn rank_of(&self, node_id: &str) -> Option<u32> {
        self.node_ranks
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, rank)| *rank)
    }
}
