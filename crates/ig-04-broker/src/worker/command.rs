//! Worker command variants and their execution against one ML worker.
//!
//! Dispatch is a single `execute` per variant. Commands that can race
//! with late reconciliation (`InferenceUp`, `StartPocV2`) check remote
//! status before acting so re-delivery is harmless.

use std::sync::Arc;

use ig_01_ml_client::{
    MlNodeClient, PocInitGenerateV2, PowStatus, TrainingStartRequest,
};
use shared_types::{GovernanceModel, HardwareStatus, ModelSpec, PocStatus, TrainingTask};
use tracing::{debug, warn};

/// Everything a command needs to run against one node.
pub struct WorkerContext {
    /// Node id, echoed into the result.
    pub node_id: String,
    /// Registration number.
    pub node_num: u64,
    /// Client bound to the node's current URLs.
    pub client: Arc<dyn MlNodeClient>,
    /// Status at dispatch time.
    pub current_status: HardwareStatus,
    /// PoC sub-status at dispatch time.
    pub current_poc_status: PocStatus,
}

/// Model-selection inputs for `InferenceUp`.
#[derive(Debug, Clone, Default)]
pub struct InferenceUpPlan {
    /// Models assigned to this node by the current epoch, in preference
    /// order.
    pub epoch_models: Vec<String>,
    /// Governance-approved models with epoch-level arguments.
    pub governance_models: Vec<GovernanceModel>,
    /// The node's declared models with local arguments.
    pub node_models: Vec<ModelSpec>,
}

impl InferenceUpPlan {
    /// Pick the model to serve and the merged argument list.
    ///
    /// Preference: first epoch-assigned model the node declares, then the
    /// first governance model the node declares. Arguments merge epoch
    /// args first, local args after (later flags override at the worker).
    pub fn choose_model(&self) -> Option<(String, Vec<String>)> {
        let local = |id: &str| self.node_models.iter().find(|m| m.id == id);
        let epoch_args = |id: &str| {
            self.governance_models
                .iter()
                .find(|g| g.id == id)
                .map(|g| g.args.clone())
                .unwrap_or_default()
        };

        let merge = |id: &str, spec: &ModelSpec| {
            let mut args = epoch_args(id);
            args.extend(spec.args.iter().cloned());
            (id.to_string(), args)
        };

        for id in &self.epoch_models {
            if let Some(spec) = local(id) {
                return Some(merge(id, spec));
            }
        }
        for governance in &self.governance_models {
            if let Some(spec) = local(&governance.id) {
                return Some(merge(&governance.id, spec));
            }
        }
        None
    }
}

/// Training assignment for one node.
#[derive(Debug, Clone)]
pub struct TrainingPlan {
    /// The fleet-wide task.
    pub task: TrainingTask,
    /// This node's rank.
    pub rank: u32,
}

/// Commands executed by a node worker, one at a time.
pub enum NodeWorkerCommand {
    /// Stop all workloads. Target STOPPED/IDLE.
    Stop,
    /// Bring inference up (idempotent when already healthy). Target
    /// INFERENCE/IDLE.
    InferenceUp(InferenceUpPlan),
    /// Start V2 PoC generation (idempotent when already generating).
    /// Target POC/GENERATING.
    StartPocV2(PocInitGenerateV2),
    /// Local transition into validation; no network call. Target
    /// POC/VALIDATING.
    TransitionPocToValidatingV2,
    /// Stop, then join a training task. Target TRAINING/IDLE.
    StartTraining(TrainingPlan),
    /// Succeed without change.
    NoOp {
        /// Logged reason.
        message: String,
    },
}

/// Result of one worker command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    /// Node the command ran against.
    pub node_id: String,
    /// Whether the command achieved its target.
    pub succeeded: bool,
    /// Failure description, if any.
    pub error: Option<String>,
    /// Status after execution (the target on success, FAILED otherwise).
    pub final_status: HardwareStatus,
    /// PoC sub-status after execution.
    pub final_poc_status: PocStatus,
    /// The status the command was driving toward.
    pub original_target: HardwareStatus,
    /// The PoC sub-status the command was driving toward.
    pub original_poc_target: PocStatus,
    /// The command was canceled; stored state must not change.
    pub canceled: bool,
}

impl NodeWorkerCommand {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::InferenceUp(_) => "inference_up",
            Self::StartPocV2(_) => "start_poc_v2",
            Self::TransitionPocToValidatingV2 => "transition_poc_to_validating_v2",
            Self::StartTraining(_) => "start_training",
            Self::NoOp { .. } => "noop",
        }
    }

    /// The state this command drives toward.
    pub fn target(&self, ctx: &WorkerContext) -> (HardwareStatus, PocStatus) {
        match self {
            Self::Stop => (HardwareStatus::Stopped, PocStatus::Idle),
            Self::InferenceUp(_) => (HardwareStatus::Inference, PocStatus::Idle),
            Self::StartPocV2(_) => (HardwareStatus::Poc, PocStatus::Generating),
            Self::TransitionPocToValidatingV2 => (HardwareStatus::Poc, PocStatus::Validating),
            Self::StartTraining(_) => (HardwareStatus::Training, PocStatus::Idle),
            Self::NoOp { .. } => (ctx.current_status, ctx.current_poc_status),
        }
    }

    /// Execute against the node. Never panics; failures are folded into
    /// the result.
    pub async fn execute(&self, ctx: &WorkerContext) -> NodeResult {
        let (target_status, target_poc) = self.target(ctx);
        let outcome = self.run(ctx).await;

        match outcome {
            Ok(()) => NodeResult {
                node_id: ctx.node_id.clone(),
                succeeded: true,
                error: None,
                final_status: target_status,
                final_poc_status: target_poc,
                original_target: target_status,
                original_poc_target: target_poc,
                canceled: false,
            },
            Err(message) => NodeResult {
                node_id: ctx.node_id.clone(),
                succeeded: false,
                error: Some(message),
                final_status: HardwareStatus::Failed,
                final_poc_status: ctx.current_poc_status,
                original_target: target_status,
                original_poc_target: target_poc,
                canceled: false,
            },
        }
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<(), String> {
        match self {
            Self::Stop => ctx.client.stop().await.map_err(|e| e.to_string()),

            Self::InferenceUp(plan) => {
                // Idempotency: a node already serving healthy inference is
                // left alone, except a stale PoC workload is stopped.
                if ctx.current_status == HardwareStatus::Inference
                    && ctx.client.inference_health().await.unwrap_or(false)
                {
                    match ctx.client.pow_status_v2().await {
                        Ok(PowStatus::Generating | PowStatus::Validating) => {
                            if let Err(e) = ctx.client.stop_pow_v2().await {
                                warn!(
                                    node = %ctx.node_id,
                                    "[ig-04] Stale PoC stop failed: {e}"
                                );
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(node = %ctx.node_id, "[ig-04] PoC status probe failed: {e}");
                        }
                    }
                    return Ok(());
                }

                ctx.client.stop().await.map_err(|e| e.to_string())?;

                let (model, args) = plan
                    .choose_model()
                    .ok_or_else(|| "no model shared with governance set".to_string())?;
                ctx.client
                    .inference_up(&model, &args)
                    .await
                    .map_err(|e| e.to_string())
            }

            Self::StartPocV2(init) => {
                // Idempotency: a node already generating keeps generating.
                if let Ok(PowStatus::Generating) = ctx.client.pow_status_v2().await {
                    return Ok(());
                }
                ctx.client
                    .init_generate_v2(init)
                    .await
                    .map_err(|e| e.to_string())
            }

            Self::TransitionPocToValidatingV2 => {
                match ctx.current_status {
                    HardwareStatus::Poc | HardwareStatus::Inference => Ok(()),
                    other => Err(format!(
                        "cannot transition to validating from {other:?}"
                    )),
                }
            }

            Self::StartTraining(plan) => {
                ctx.client.stop().await.map_err(|e| e.to_string())?;
                let request = TrainingStartRequest {
                    task_id: plan.task.task_id,
                    master_addr: plan.task.master_addr.clone(),
                    rank: plan.rank,
                    world_size: plan.task.world_size,
                };
                ctx.client
                    .start_training(&request)
                    .await
                    .map_err(|e| e.to_string())
            }

            Self::NoOp { message } => {
                debug!(node = %ctx.node_id, "[ig-04] NoOp: {message}");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_01_ml_client::{MockMlNodeClient, PocModelParams};

    fn ctx(
        client: &MockMlNodeClient,
        status: HardwareStatus,
        poc_status: PocStatus,
    ) -> WorkerContext {
        WorkerContext {
            node_id: "node1".to_string(),
            node_num: 1,
            client: Arc::new(client.clone()),
            current_status: status,
            current_poc_status: poc_status,
        }
    }

    fn plan() -> InferenceUpPlan {
        InferenceUpPlan {
            epoch_models: vec!["model-epoch".to_string()],
            governance_models: vec![
                GovernanceModel {
                    id: "model-epoch".to_string(),
                    args: vec!["--tensor-parallel=2".to_string()],
                },
                GovernanceModel {
                    id: "model-gov".to_string(),
                    args: vec![],
                },
            ],
            node_models: vec![
                ModelSpec {
                    id: "model-epoch".to_string(),
                    args: vec!["--gpu-fraction=0.9".to_string()],
                },
                ModelSpec {
                    id: "model-gov".to_string(),
                    args: vec![],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_inference_up_is_noop_when_healthy() {
        let mock = MockMlNodeClient::new();
        mock.set_inference_healthy(true);
        mock.set_pow_status_v2(PowStatus::Generating);

        let command = NodeWorkerCommand::InferenceUp(plan());
        let result = command
            .execute(&ctx(&mock, HardwareStatus::Inference, PocStatus::Idle))
            .await;

        assert!(result.succeeded);
        // No Stop, no inference_up; but the stale generation was stopped.
        assert_eq!(mock.calls("stop"), 0);
        assert_eq!(mock.calls("inference_up"), 0);
        assert_eq!(mock.calls("stop_pow_v2"), 1);
    }

    #[tokio::test]
    async fn test_inference_up_restarts_unhealthy_node() {
        let mock = MockMlNodeClient::new();
        mock.set_inference_healthy(false);

        let command = NodeWorkerCommand::InferenceUp(plan());
        let result = command
            .execute(&ctx(&mock, HardwareStatus::Stopped, PocStatus::Idle))
            .await;

        assert!(result.succeeded);
        assert_eq!(result.final_status, HardwareStatus::Inference);
        assert_eq!(mock.calls("stop"), 1);
        assert_eq!(mock.calls("inference_up"), 1);

        // Epoch model preferred; epoch args come before local ones.
        let (model, args) = mock.last_inference_up().unwrap();
        assert_eq!(model, "model-epoch");
        assert_eq!(
            args,
            vec!["--tensor-parallel=2".to_string(), "--gpu-fraction=0.9".to_string()]
        );
    }

    #[tokio::test]
    async fn test_inference_up_falls_back_to_governance_intersection() {
        let mock = MockMlNodeClient::new();
        let mut fallback_plan = plan();
        fallback_plan.epoch_models = vec!["model-absent".to_string()];

        let command = NodeWorkerCommand::InferenceUp(fallback_plan);
        let result = command
            .execute(&ctx(&mock, HardwareStatus::Stopped, PocStatus::Idle))
            .await;

        assert!(result.succeeded);
        assert_eq!(mock.last_inference_up().unwrap().0, "model-gov");
    }

    #[tokio::test]
    async fn test_inference_up_fails_without_intersection() {
        let mock = MockMlNodeClient::new();
        let empty_plan = InferenceUpPlan {
            epoch_models: vec![],
            governance_models: vec![GovernanceModel {
                id: "only-governance".to_string(),
                args: vec![],
            }],
            node_models: vec![ModelSpec {
                id: "only-local".to_string(),
                args: vec![],
            }],
        };

        let command = NodeWorkerCommand::InferenceUp(empty_plan);
        let result = command
            .execute(&ctx(&mock, HardwareStatus::Stopped, PocStatus::Idle))
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.final_status, HardwareStatus::Failed);
        assert!(result.error.unwrap().contains("no model"));
    }

    #[tokio::test]
    async fn test_start_poc_v2_is_idempotent_while_generating() {
        let mock = MockMlNodeClient::new();
        mock.set_pow_status_v2(PowStatus::Generating);

        let init = PocInitGenerateV2 {
            block_hash: "H".to_string(),
            block_height: 100,
            public_key: "ab".to_string(),
            node_id: 1,
            node_count: 1,
            params: PocModelParams {
                model: "m".to_string(),
                seq_len: 8,
            },
            url: "http://cb/v2/poc-batches".to_string(),
        };
        let command = NodeWorkerCommand::StartPocV2(init);
        let result = command
            .execute(&ctx(&mock, HardwareStatus::Poc, PocStatus::Generating))
            .await;

        assert!(result.succeeded);
        assert_eq!(mock.calls("init_generate_v2"), 0);
    }

    #[tokio::test]
    async fn test_transition_to_validating_rules() {
        let mock = MockMlNodeClient::new();

        let result = NodeWorkerCommand::TransitionPocToValidatingV2
            .execute(&ctx(&mock, HardwareStatus::Poc, PocStatus::Generating))
            .await;
        assert!(result.succeeded);
        assert_eq!(result.final_poc_status, PocStatus::Validating);

        let result = NodeWorkerCommand::TransitionPocToValidatingV2
            .execute(&ctx(&mock, HardwareStatus::Stopped, PocStatus::Idle))
            .await;
        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("cannot transition"));
    }

    #[tokio::test]
    async fn test_training_uses_assigned_rank() {
        let mock = MockMlNodeClient::new();
        let command = NodeWorkerCommand::StartTraining(TrainingPlan {
            task: TrainingTask {
                task_id: 11,
                participant: "grid1p".to_string(),
                master_addr: "10.0.0.1:29500".to_string(),
                node_ranks: vec![("node1".to_string(), 3)],
                world_size: 8,
            },
            rank: 3,
        });

        let result = command
            .execute(&ctx(&mock, HardwareStatus::Inference, PocStatus::Idle))
            .await;
        assert!(result.succeeded);
        assert_eq!(result.final_status, HardwareStatus::Training);
        assert_eq!(mock.calls("stop"), 1);
        assert_eq!(mock.calls("start_training"), 1);
    }
}
