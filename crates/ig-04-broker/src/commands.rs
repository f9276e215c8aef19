//! The broker command set.
//!
//! Every command carries a oneshot reply channel; callers use
//! [`crate::handle::BrokerHandle`] rather than constructing commands
//! directly. `WorkerResult` is internal: node workers report completions
//! through the same intake so all state mutation stays on the actor.

use serde::{Deserialize, Serialize};
use shared_types::{
    ChainParams, EpochIndex, GovernanceModel, HardwareStatus, MlNode, MlNodeConfig, NodeSnapshot,
    PocStatus, TrainingTask,
};
use tokio::sync::oneshot;

use crate::error::Result;
use crate::worker::NodeResult;

/// Outcome reported when releasing an inference lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOutcome {
    /// The inference call succeeded (2xx upstream).
    Success,
    /// The inference call failed; the message is kept for observation.
    Error {
        /// Failure description.
        message: String,
    },
}

/// A granted inference reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLease {
    /// Locked node id; must be passed back on release.
    pub node_id: String,
    /// Inference URL to call.
    pub inference_url: String,
    /// Registration number, for logging.
    pub node_num: u64,
}

/// One observed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Node the observation belongs to.
    pub node_id: String,
    /// Observed hardware status.
    pub status: HardwareStatus,
    /// Observed PoC sub-status.
    pub poc_status: PocStatus,
}

/// Commands accepted by the broker actor.
pub enum BrokerCommand {
    /// Register a new node.
    RegisterNode {
        /// Candidate configuration.
        config: MlNodeConfig,
        /// Registered node or validation error.
        reply: oneshot::Sender<Result<MlNode>>,
    },
    /// Update an existing node's configuration.
    UpdateNode {
        /// Replacement configuration (same id).
        config: MlNodeConfig,
        /// Updated node or validation error.
        reply: oneshot::Sender<Result<MlNode>>,
    },
    /// Remove a node, releasing its locks and stopping its worker.
    RemoveNode {
        /// Node to remove.
        id: String,
        /// Whether the node existed.
        reply: oneshot::Sender<bool>,
    },
    /// Reserve one inference slot on an eligible node.
    LockAvailableNode {
        /// Model the request needs.
        model: String,
        /// Nodes to skip (already tried).
        skip_ids: Vec<String>,
        /// Lease, or `None` when no node qualifies.
        reply: oneshot::Sender<Option<NodeLease>>,
    },
    /// Return one previously acquired lock.
    ReleaseNode {
        /// Node the lock was held on.
        id: String,
        /// How the guarded call ended.
        outcome: LockOutcome,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Drive every node toward inference.
    InferenceUpAll {
        /// Ack (commands enqueued, not completed).
        reply: oneshot::Sender<()>,
    },
    /// Stop every node.
    StopAll {
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Start V2 PoC generation on every node.
    StartPocAll {
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Move generating nodes into validation.
    TransitionPocToValidating {
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Fan a training task out to the ranked nodes.
    StartTraining {
        /// Task with per-node ranks.
        task: TrainingTask,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Apply observed status changes.
    SetNodesActualStatus {
        /// Observations, applied atomically per node.
        updates: Vec<StatusUpdate>,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Record which nodes serve a model this epoch.
    UpdateNodeEpochData {
        /// Model assigned.
        model: String,
        /// Nodes carrying the assignment; others lose it.
        node_ids: Vec<String>,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Mark nodes reserved for inference continuity through the next PoC.
    SetInferenceContinuity {
        /// Reserved nodes; others are cleared.
        node_ids: Vec<String>,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Enable or disable a node administratively.
    SetNodeAdminState {
        /// Target node.
        id: String,
        /// Operator intent.
        enabled: bool,
        /// Epoch at which the intent takes effect.
        effective_epoch: EpochIndex,
        /// Ack or unknown-node error.
        reply: oneshot::Sender<Result<()>>,
    },
    /// Refresh the cached chain context (params, governance models).
    SetChainContext {
        /// Current parameter bundle.
        params: ChainParams,
        /// Governance model list.
        governance_models: Vec<GovernanceModel>,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Kick the reconciler.
    TriggerStatusQuery {
        /// Also forget observed statuses so idempotent commands re-probe.
        force_probe: bool,
        /// Ack.
        reply: oneshot::Sender<()>,
    },
    /// Materialized fleet snapshot.
    GetNodes {
        /// Snapshot of every node.
        reply: oneshot::Sender<Vec<NodeSnapshot>>,
    },
    /// Internal: a node worker finished a command.
    WorkerResult {
        /// The result to fold into state.
        result: NodeResult,
    },
    /// Stop the broker and all workers.
    Shutdown {
        /// Ack once workers are signaled.
        reply: oneshot::Sender<()>,
    },
}

impl BrokerCommand {
    /// Command kind label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterNode { .. } => "register_node",
            Self::UpdateNode { .. } => "update_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::LockAvailableNode { .. } => "lock_available_node",
            Self::ReleaseNode { .. } => "release_node",
            Self::InferenceUpAll { .. } => "inference_up_all",
            Self::StopAll { .. } => "stop_all",
            Self::StartPocAll { .. } => "start_poc_all",
            Self::TransitionPocToValidating { .. } => "transition_poc_to_validating",
            Self::StartTraining { .. } => "start_training",
            Self::SetNodesActualStatus { .. } => "set_nodes_actual_status",
            Self::UpdateNodeEpochData { .. } => "update_node_epoch_data",
            Self::SetInferenceContinuity { .. } => "set_inference_continuity",
            Self::SetNodeAdminState { .. } => "set_node_admin_state",
            Self::SetChainContext { .. } => "set_chain_context",
            Self::TriggerStatusQuery { .. } => "trigger_status_query",
            Self::GetNodes { .. } => "get_nodes",
            Self::WorkerResult { .. } => "worker_result",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}
