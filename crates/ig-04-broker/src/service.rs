//! The broker actor.
//!
//! One task, one intake, serial command processing. All I/O is delegated:
//! remote node operations run on node workers, hardware diffs are
//! submitted from detached tasks. The command loop itself only reads the
//! phase tracker (a lock-free value copy) and mutates in-memory state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ig_01_ml_client::{MlClientFactory, PocInitGenerateV2, PocModelParams};
use ig_02_chain_bridge::{ChainBridge, PhaseTracker};
use shared_types::{
    ChainParams, GovernanceModel, HardwareNode, HardwareStatus, MlNode, MsgHardwareDiff,
    NodeSnapshot, PhaseSnapshot, PocStatus,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::{BrokerCommand, LockOutcome, NodeLease, StatusUpdate};
use crate::config::{BrokerConfig, BrokerIdentity};
use crate::domain::{compute_target, LockTable, NodeRegistry, RegisteredNode, Target};
use crate::handle::BrokerHandle;
use crate::worker::{
    InferenceUpPlan, NodeResult, NodeWorkerCommand, NodeWorkerHandle, TrainingPlan, WorkerContext,
    WorkerJob,
};

/// The broker actor. Construct with [`Broker::spawn`].
pub struct Broker {
    identity: BrokerIdentity,
    factory: Arc<dyn MlClientFactory>,
    bridge: Arc<dyn ChainBridge>,
    tracker: Arc<PhaseTracker>,

    registry: NodeRegistry,
    locks: LockTable,
    workers: HashMap<String, NodeWorkerHandle>,
    inflight: HashSet<String>,

    chain_params: ChainParams,
    governance_models: Vec<GovernanceModel>,

    intake: mpsc::Receiver<BrokerCommand>,
    self_tx: mpsc::Sender<BrokerCommand>,
    dirty: bool,
    shutting_down: bool,
}

impl Broker {
    /// Spawn the broker task; returns its handle and join handle.
    pub fn spawn(
        config: BrokerConfig,
        identity: BrokerIdentity,
        factory: Arc<dyn MlClientFactory>,
        bridge: Arc<dyn ChainBridge>,
        tracker: Arc<PhaseTracker>,
    ) -> (BrokerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer);
        let broker = Self {
            identity,
            factory,
            bridge,
            tracker,
            registry: NodeRegistry::new(config.max_nodes),
            locks: LockTable::new(),
            workers: HashMap::new(),
            inflight: HashSet::new(),
            chain_params: ChainParams::default(),
            governance_models: Vec::new(),
            intake: rx,
            self_tx: tx.clone(),
            dirty: false,
            shutting_down: false,
        };
        let join = tokio::spawn(broker.run());
        (BrokerHandle::new(tx), join)
    }

    async fn run(mut self) {
        info!("[ig-04] Broker started");

        while let Some(command) = self.intake.recv().await {
            self.handle_command(command);

            // Coalesce whatever is already queued so a burst of triggers
            // becomes one reconciliation pass.
            while !self.shutting_down {
                match self.intake.try_recv() {
                    Ok(command) => self.handle_command(command),
                    Err(_) => break,
                }
            }

            if self.shutting_down {
                break;
            }

            if self.dirty {
                self.dirty = false;
                self.reconcile();
            }
        }

        for (_, worker) in self.workers.drain() {
            worker.shutdown();
        }
        info!("[ig-04] Broker stopped");
    }

    fn handle_command(&mut self, command: BrokerCommand) {
        grid_telemetry::BROKER_COMMANDS_TOTAL
            .with_label_values(&[command.kind()])
            .inc();

        match command {
            BrokerCommand::RegisterNode { config, reply } => {
                let epoch = self.tracker.snapshot().epoch_index;
                let result = self.registry.register(&config, epoch);
                if let Ok(node) = &result {
                    info!(id = %node.config.id, num = node.node_num, "[ig-04] Node registered");
                    self.workers.insert(
                        node.config.id.clone(),
                        NodeWorkerHandle::spawn(node.config.id.clone(), self.self_tx.clone()),
                    );
                    grid_telemetry::NODES_REGISTERED.set(self.registry.len() as f64);
                    self.report_hardware_diff(MsgHardwareDiff {
                        added: vec![hardware_entry(node)],
                        removed: vec![],
                    });
                    self.dirty = true;
                }
                let _ = reply.send(result);
            }

            BrokerCommand::UpdateNode { config, reply } => {
                let result = self.registry.update(&config);
                if let Ok(node) = &result {
                    info!(id = %node.config.id, "[ig-04] Node updated");
                    // Reservations must not outlive the configuration
                    // they were granted against.
                    self.locks.release_all(&node.config.id);
                    self.dirty = true;
                }
                let _ = reply.send(result);
            }

            BrokerCommand::RemoveNode { id, reply } => {
                let removed = self.registry.remove(&id);
                let existed = removed.is_some();
                if let Some(removed) = removed {
                    info!(id = %id, "[ig-04] Node removed");
                    self.locks.release_all(&id);
                    self.inflight.remove(&id);
                    if let Some(worker) = self.workers.remove(&id) {
                        worker.shutdown();
                    }
                    grid_telemetry::NODES_REGISTERED.set(self.registry.len() as f64);
                    self.report_hardware_diff(MsgHardwareDiff {
                        added: vec![],
                        removed: vec![hardware_entry(&removed.node)],
                    });
                    self.dirty = true;
                }
                let _ = reply.send(existed);
            }

            BrokerCommand::LockAvailableNode {
                model,
                skip_ids,
                reply,
            } => {
                let lease = self.lock_available_node(&model, &skip_ids);
                let _ = reply.send(lease);
            }

            BrokerCommand::ReleaseNode { id, outcome, reply } => {
                self.locks.release(&id, &outcome);
                if let LockOutcome::Error { message } = &outcome {
                    debug!(id = %id, "[ig-04] Lock released with error: {message}");
                }
                let _ = reply.send(());
            }

            BrokerCommand::InferenceUpAll { reply } => {
                self.fan_out(|broker, rn| {
                    Some((
                        Target::new(HardwareStatus::Inference, PocStatus::Idle),
                        broker.inference_up_command(rn),
                    ))
                });
                let _ = reply.send(());
            }

            BrokerCommand::StopAll { reply } => {
                self.fan_out(|_, _| {
                    Some((
                        Target::new(HardwareStatus::Stopped, PocStatus::Idle),
                        NodeWorkerCommand::Stop,
                    ))
                });
                let _ = reply.send(());
            }

            BrokerCommand::StartPocAll { reply } => {
                let snapshot = self.tracker.snapshot();
                self.fan_out(|broker, rn| {
                    broker.start_poc_command(rn, &snapshot).map(|command| {
                        (
                            Target::new(HardwareStatus::Poc, PocStatus::Generating),
                            command,
                        )
                    })
                });
                let _ = reply.send(());
            }

            BrokerCommand::TransitionPocToValidating { reply } => {
                self.fan_out(|_, _| {
                    Some((
                        Target::new(HardwareStatus::Poc, PocStatus::Validating),
                        NodeWorkerCommand::TransitionPocToValidatingV2,
                    ))
                });
                let _ = reply.send(());
            }

            BrokerCommand::StartTraining { task, reply } => {
                self.fan_out(|_, rn| {
                    let rank = task.rank_of(&rn.node.config.id)?;
                    Some((
                        Target::new(HardwareStatus::Training, PocStatus::Idle),
                        NodeWorkerCommand::StartTraining(TrainingPlan {
                            task: task.clone(),
                            rank,
                        }),
                    ))
                });
                let _ = reply.send(());
            }

            BrokerCommand::SetNodesActualStatus { updates, reply } => {
                self.apply_status_updates(updates);
                let _ = reply.send(());
            }

            BrokerCommand::UpdateNodeEpochData {
                model,
                node_ids,
                reply,
            } => {
                for (id, rn) in self.registry.iter_mut() {
                    if node_ids.contains(id) {
                        rn.state.epoch_models.insert(model.clone());
                    } else {
                        rn.state.epoch_models.remove(&model);
                    }
                }
                self.dirty = true;
                let _ = reply.send(());
            }

            BrokerCommand::SetInferenceContinuity { node_ids, reply } => {
                for (id, rn) in self.registry.iter_mut() {
                    rn.state.should_continue_inference = node_ids.contains(id);
                }
                self.dirty = true;
                let _ = reply.send(());
            }

            BrokerCommand::SetNodeAdminState {
                id,
                enabled,
                effective_epoch,
                reply,
            } => {
                let result = match self.registry.get_mut(&id) {
                    Some(rn) => {
                        rn.node.admin.enabled = enabled;
                        rn.node.admin.effective_epoch = effective_epoch;
                        info!(id = %id, enabled, effective_epoch, "[ig-04] Admin state set");
                        self.dirty = true;
                        Ok(())
                    }
                    None => Err(crate::error::BrokerError::UnknownNode(id)),
                };
                let _ = reply.send(result);
            }

            BrokerCommand::SetChainContext {
                params,
                governance_models,
                reply,
            } => {
                self.chain_params = params;
                self.governance_models = governance_models;
                self.dirty = true;
                let _ = reply.send(());
            }

            BrokerCommand::TriggerStatusQuery { force_probe, reply } => {
                if force_probe {
                    // Forget observations so the idempotent commands
                    // re-probe remote state on the next pass.
                    let inflight = self.inflight.clone();
                    for (id, rn) in self.registry.iter_mut() {
                        if !inflight.contains(id) {
                            rn.state.current_status = HardwareStatus::Unknown;
                            rn.state.failure = None;
                        }
                    }
                }
                self.dirty = true;
                let _ = reply.send(());
            }

            BrokerCommand::GetNodes { reply } => {
                let snapshots = self
                    .registry
                    .iter()
                    .map(|(id, rn)| NodeSnapshot {
                        node: rn.node.clone(),
                        state: rn.state.clone(),
                        locks_in_use: self.locks.count(id),
                    })
                    .collect();
                let _ = reply.send(snapshots);
            }

            BrokerCommand::WorkerResult { result } => {
                self.apply_worker_result(result);
            }

            BrokerCommand::Shutdown { reply } => {
                info!("[ig-04] Shutdown requested");
                self.shutting_down = true;
                for worker in self.workers.values() {
                    worker.shutdown();
                }
                let _ = reply.send(());
            }
        }
    }

    // -------------------------------------------------------------------------
    // Locks
    // -------------------------------------------------------------------------

    fn lock_available_node(&mut self, model: &str, skip_ids: &[String]) -> Option<NodeLease> {
        let snapshot = self.tracker.snapshot();

        let mut best: Option<(String, u32)> = None;
        for (id, rn) in self.registry.iter() {
            if skip_ids.iter().any(|s| s == id) {
                continue;
            }
            if rn.state.current_status != HardwareStatus::Inference {
                continue;
            }
            if !rn
                .node
                .admin
                .should_be_operational(snapshot.epoch_index, snapshot.current_phase)
            {
                continue;
            }
            if !rn.node.config.declares_model(model) {
                continue;
            }
            let count = self.locks.count(id);
            if count >= rn.node.config.max_concurrent {
                continue;
            }
            // Fewest outstanding locks wins; iteration is id-ordered, so
            // ties resolve to the lexicographically smallest id.
            if best.as_ref().map_or(true, |(_, c)| count < *c) {
                best = Some((id.clone(), count));
            }
        }

        let (id, _) = best?;
        self.locks.acquire(&id);
        let rn = self.registry.get(&id).expect("selected node exists");
        Some(NodeLease {
            node_id: id.clone(),
            inference_url: rn.node.config.inference_url(),
            node_num: rn.node.node_num,
        })
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    fn reconcile(&mut self) {
        let snapshot = self.tracker.snapshot();
        if !snapshot.is_synced {
            debug!("[ig-04] Reconcile skipped: tracker unsynced");
            return;
        }

        let mut to_dispatch: Vec<(String, NodeWorkerCommand)> = Vec::new();
        let governance = self.governance_models.clone();
        let poc_params = self.chain_params.poc.clone();
        let identity = self.identity.clone();
        let node_count = self.registry.len() as u32;
        let inflight = self.inflight.clone();

        for (id, rn) in self.registry.iter_mut() {
            let target = compute_target(
                rn.node.admin,
                snapshot.epoch_index,
                snapshot.current_phase,
                rn.state.should_continue_inference,
            );
            rn.state.intended_status = target.status;
            rn.state.intended_poc_status = target.poc_status;

            if inflight.contains(id) {
                continue;
            }
            if rn.state.current_status == target.status
                && rn.state.current_poc_status == target.poc_status
            {
                continue;
            }

            let command = command_toward(
                target,
                rn,
                &snapshot,
                &governance,
                &poc_params,
                &identity,
                node_count,
            );
            if let Some(command) = command {
                to_dispatch.push((id.clone(), command));
            }
        }

        for (id, command) in to_dispatch {
            debug!(id = %id, command = command.label(), "[ig-04] Reconcile dispatch");
            self.dispatch_to_node(&id, command);
        }
    }

    /// Fan an intent out to every node: the closure decides the intended
    /// target and command per node (or skips it).
    fn fan_out<F>(&mut self, mut build: F)
    where
        F: FnMut(&Broker, &RegisteredNode) -> Option<(Target, NodeWorkerCommand)>,
    {
        let ids: Vec<String> = self.registry.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            if self.inflight.contains(&id) {
                debug!(id = %id, "[ig-04] Fan-out skipped: command in flight");
                continue;
            }
            let Some(rn) = self.registry.get(&id) else {
                continue;
            };
            let Some((target, command)) = build(self, rn) else {
                continue;
            };
            if let Some(rn) = self.registry.get_mut(&id) {
                rn.state.intended_status = target.status;
                rn.state.intended_poc_status = target.poc_status;
            }
            self.dispatch_to_node(&id, command);
        }
    }

    fn dispatch_to_node(&mut self, id: &str, command: NodeWorkerCommand) {
        if self.inflight.contains(id) {
            return;
        }
        let Some(rn) = self.registry.get(id) else {
            return;
        };
        let context = WorkerContext {
            node_id: id.to_string(),
            node_num: rn.node.node_num,
            client: self
                .factory
                .create(&rn.node.config.poc_url(), &rn.node.config.inference_url()),
            current_status: rn.state.current_status,
            current_poc_status: rn.state.current_poc_status,
        };
        let Some(worker) = self.workers.get(id) else {
            return;
        };
        if worker.try_dispatch(WorkerJob { command, context }) {
            self.inflight.insert(id.to_string());
        } else {
            // One-slot intake plus in-flight tracking should make this
            // unreachable.
            error!(id = %id, "[ig-04] Worker intake full; command dropped");
        }
    }

    fn apply_worker_result(&mut self, result: NodeResult) {
        self.inflight.remove(&result.node_id);
        if result.canceled {
            debug!(id = %result.node_id, "[ig-04] Command canceled; state unchanged");
            return;
        }
        let Some(rn) = self.registry.get_mut(&result.node_id) else {
            return;
        };
        if result.succeeded {
            rn.state.current_status = result.final_status;
            rn.state.current_poc_status = result.final_poc_status;
            rn.state.failure = None;
            // The target may have moved while the command ran.
            self.dirty = true;
        } else {
            warn!(
                id = %result.node_id,
                target = ?result.original_target,
                "[ig-04] Command failed: {}",
                result.error.as_deref().unwrap_or("unknown")
            );
            rn.state.current_status = HardwareStatus::Failed;
            rn.state.failure = result.error;
            // Retried on the next trigger, not immediately.
        }
    }

    fn apply_status_updates(&mut self, updates: Vec<StatusUpdate>) {
        for update in updates {
            if let Some(rn) = self.registry.get_mut(&update.node_id) {
                rn.state.current_status = update.status;
                rn.state.current_poc_status = update.poc_status;
            }
        }
        self.dirty = true;
    }

    // -------------------------------------------------------------------------
    // Command builders
    // -------------------------------------------------------------------------

    fn inference_up_command(&self, rn: &RegisteredNode) -> NodeWorkerCommand {
        NodeWorkerCommand::InferenceUp(InferenceUpPlan {
            epoch_models: rn.state.epoch_models.iter().cloned().collect(),
            governance_models: self.governance_models.clone(),
            node_models: rn.node.config.models.clone(),
        })
    }

    fn start_poc_command(
        &self,
        rn: &RegisteredNode,
        snapshot: &PhaseSnapshot,
    ) -> Option<NodeWorkerCommand> {
        build_start_poc(
            rn,
            snapshot,
            &self.chain_params.poc,
            &self.identity,
            self.registry.len() as u32,
        )
    }

    fn report_hardware_diff(&self, diff: MsgHardwareDiff) {
        if diff.is_empty() {
            return;
        }
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.submit_hardware_diff(diff).await {
                warn!("[ig-04] Hardware diff submission failed: {e}");
            }
        });
    }
}

fn hardware_entry(node: &MlNode) -> HardwareNode {
    HardwareNode {
        node_id: node.config.id.clone(),
        hardware: node.config.hardware.clone(),
    }
}

fn build_start_poc(
    rn: &RegisteredNode,
    snapshot: &PhaseSnapshot,
    poc_params: &shared_types::PocParams,
    identity: &BrokerIdentity,
    node_count: u32,
) -> Option<NodeWorkerCommand> {
    if !snapshot.poc_v2_enabled {
        // V1 generation is driven from the chain side; nothing to start.
        return None;
    }
    let (stage_height, seed_hash) = match &snapshot.active_confirmation_event {
        Some(event) => (event.trigger_height, event.poc_seed_block_hash.clone()),
        None => (
            snapshot.poc_start_block_height,
            snapshot.poc_start_block_hash.clone(),
        ),
    };
    let seed_hash = if seed_hash.is_empty() {
        snapshot.block_hash.clone()
    } else {
        seed_hash
    };
    Some(NodeWorkerCommand::StartPocV2(PocInitGenerateV2 {
        block_hash: seed_hash,
        block_height: stage_height,
        public_key: identity.participant_pubkey_hex.clone(),
        node_id: rn.node.node_num,
        node_count,
        params: PocModelParams {
            model: poc_params.model_id.clone(),
            seq_len: poc_params.seq_len,
        },
        url: identity.poc_batches_url(),
    }))
}

/// Reconciler command selection toward a target.
fn command_toward(
    target: Target,
    rn: &RegisteredNode,
    snapshot: &PhaseSnapshot,
    governance: &[GovernanceModel],
    poc_params: &shared_types::PocParams,
    identity: &BrokerIdentity,
    node_count: u32,
) -> Option<NodeWorkerCommand> {
    match (target.status, target.poc_status) {
        (HardwareStatus::Stopped, _) => Some(NodeWorkerCommand::Stop),
        (HardwareStatus::Inference, _) => Some(NodeWorkerCommand::InferenceUp(InferenceUpPlan {
            epoch_models: rn.state.epoch_models.iter().cloned().collect(),
            governance_models: governance.to_vec(),
            node_models: rn.node.config.models.clone(),
        })),
        (HardwareStatus::Poc, PocStatus::Generating) => {
            build_start_poc(rn, snapshot, poc_params, identity, node_count)
        }
        (HardwareStatus::Poc, _) => Some(NodeWorkerCommand::TransitionPocToValidatingV2),
        // Training is driven by explicit StartTraining commands only.
        _ => None,
    }
}
