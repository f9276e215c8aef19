//! Typed client handle over the broker's command channel.

use shared_types::{
    ChainParams, EpochIndex, GovernanceModel, MlNode, MlNodeConfig, NodeSnapshot, TrainingTask,
};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{BrokerCommand, LockOutcome, NodeLease, StatusUpdate};
use crate::error::{BrokerError, Result};

/// Cheap-to-clone handle; all methods enqueue a command and await its
/// reply. Every method returns [`BrokerError::Unavailable`] once the
/// broker has shut down.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<BrokerCommand>,
}

impl BrokerHandle {
    pub(crate) fn new(tx: mpsc::Sender<BrokerCommand>) -> Self {
        Self { tx }
    }

    async fn send<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> BrokerCommand,
    ) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| BrokerError::Unavailable)?;
        reply_rx.await.map_err(|_| BrokerError::Unavailable)
    }

    /// Register a new node.
    pub async fn register_node(&self, config: MlNodeConfig) -> Result<MlNode> {
        self.send(|reply| BrokerCommand::RegisterNode { config, reply })
            .await?
    }

    /// Update an existing node.
    pub async fn update_node(&self, config: MlNodeConfig) -> Result<MlNode> {
        self.send(|reply| BrokerCommand::UpdateNode { config, reply })
            .await?
    }

    /// Remove a node; `Ok(false)` when it was not registered.
    pub async fn remove_node(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.send(|reply| BrokerCommand::RemoveNode { id, reply }).await
    }

    /// Reserve one inference slot on an eligible node serving `model`.
    pub async fn lock_available_node(
        &self,
        model: &str,
        skip_ids: Vec<String>,
    ) -> Result<Option<NodeLease>> {
        let model = model.to_string();
        self.send(|reply| BrokerCommand::LockAvailableNode {
            model,
            skip_ids,
            reply,
        })
        .await
    }

    /// Return a previously acquired lock with its outcome.
    pub async fn release_node(&self, id: &str, outcome: LockOutcome) -> Result<()> {
        let id = id.to_string();
        self.send(|reply| BrokerCommand::ReleaseNode { id, outcome, reply })
            .await
    }

    /// Drive every node toward inference.
    pub async fn inference_up_all(&self) -> Result<()> {
        self.send(|reply| BrokerCommand::InferenceUpAll { reply }).await
    }

    /// Stop every node.
    pub async fn stop_all(&self) -> Result<()> {
        self.send(|reply| BrokerCommand::StopAll { reply }).await
    }

    /// Start V2 PoC generation on every node.
    pub async fn start_poc_all(&self) -> Result<()> {
        self.send(|reply| BrokerCommand::StartPocAll { reply }).await
    }

    /// Move generating nodes into validation.
    pub async fn transition_poc_to_validating(&self) -> Result<()> {
        self.send(|reply| BrokerCommand::TransitionPocToValidating { reply })
            .await
    }

    /// Fan a training task out to its ranked nodes.
    pub async fn start_training(&self, task: TrainingTask) -> Result<()> {
        self.send(|reply| BrokerCommand::StartTraining { task, reply })
            .await
    }

    /// Apply observed status changes.
    pub async fn set_nodes_actual_status(&self, updates: Vec<StatusUpdate>) -> Result<()> {
        self.send(|reply| BrokerCommand::SetNodesActualStatus { updates, reply })
            .await
    }

    /// Record the nodes serving `model` this epoch.
    pub async fn update_node_epoch_data(
        &self,
        model: &str,
        node_ids: Vec<String>,
    ) -> Result<()> {
        let model = model.to_string();
        self.send(|reply| BrokerCommand::UpdateNodeEpochData {
            model,
            node_ids,
            reply,
        })
        .await
    }

    /// Mark nodes reserved for inference continuity.
    pub async fn set_inference_continuity(&self, node_ids: Vec<String>) -> Result<()> {
        self.send(|reply| BrokerCommand::SetInferenceContinuity { node_ids, reply })
            .await
    }

    /// Enable or disable a node administratively.
    pub async fn set_node_admin_state(
        &self,
        id: &str,
        enabled: bool,
        effective_epoch: EpochIndex,
    ) -> Result<()> {
        let id = id.to_string();
        self.send(|reply| BrokerCommand::SetNodeAdminState {
            id,
            enabled,
            effective_epoch,
            reply,
        })
        .await?
    }

    /// Refresh the cached chain context.
    pub async fn set_chain_context(
        &self,
        params: ChainParams,
        governance_models: Vec<GovernanceModel>,
    ) -> Result<()> {
        self.send(|reply| BrokerCommand::SetChainContext {
            params,
            governance_models,
            reply,
        })
        .await
    }

    /// Kick the reconciler.
    pub async fn trigger_status_query(&self, force_probe: bool) -> Result<()> {
        self.send(|reply| BrokerCommand::TriggerStatusQuery { force_probe, reply })
            .await
    }

    /// Materialized fleet snapshot.
    pub async fn get_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        self.send(|reply| BrokerCommand::GetNodes { reply }).await
    }

    /// Stop the broker and its workers.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(|reply| BrokerCommand::Shutdown { reply }).await
    }
}
