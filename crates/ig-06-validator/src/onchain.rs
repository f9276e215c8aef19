//! V1 on-chain validation (legacy).
//!
//! Batches live on the chain as nonce/distance arrays; the validator
//! samples them with the same deterministic RNG and forwards the sample
//! to a local node already in the validating state. Deprecated once the
//! V2 flag is on.

use std::sync::Arc;
use std::time::Duration;

use ig_01_ml_client::MlClientFactory;
use ig_02_chain_bridge::{ChainBridge, PhaseTracker, Signer};
use ig_01_ml_client::PocBatchV1;
use shared_types::{BlockHeight, HardwareStatus, NodeSnapshot, PocStatus};
use tracing::{debug, info, warn};

use crate::error::{Result, ValidationError};
use crate::offchain::{StageStats, DEFAULT_SAMPLE_SIZE};
use crate::sampling::sample_leaf_indices;

/// Minimum retry budget per batch.
pub const POC_VALIDATE_BATCH_RETRIES: u32 = 5;

/// On-chain validator tuning knobs.
#[derive(Debug, Clone)]
pub struct OnChainConfig {
    /// Fleet snapshot retry attempts.
    pub fleet_retry_attempts: u32,
    /// Delay between fleet snapshot attempts.
    pub fleet_retry_delay: Duration,
}

impl Default for OnChainConfig {
    fn default() -> Self {
        Self {
            fleet_retry_attempts: 30,
            fleet_retry_delay: Duration::from_secs(5),
        }
    }
}

/// The V1 on-chain validator.
pub struct OnChainValidator {
    bridge: Arc<dyn ChainBridge>,
    broker: ig_04_broker::BrokerHandle,
    tracker: Arc<PhaseTracker>,
    factory: Arc<dyn MlClientFactory>,
    signer: Arc<dyn Signer>,
    config: OnChainConfig,
}

impl OnChainValidator {
    /// Wire a validator; stages are run via [`Self::run_stage`].
    pub fn new(
        bridge: Arc<dyn ChainBridge>,
        broker: ig_04_broker::BrokerHandle,
        tracker: Arc<PhaseTracker>,
        factory: Arc<dyn MlClientFactory>,
        signer: Arc<dyn Signer>,
        config: OnChainConfig,
    ) -> Self {
        Self {
            bridge,
            broker,
            tracker,
            factory,
            signer,
            config,
        }
    }

    /// Only nodes already validating may receive V1 batches.
    fn eligible(nodes: &[NodeSnapshot]) -> Vec<NodeSnapshot> {
        nodes
            .iter()
            .filter(|snapshot| {
                snapshot.state.current_status == HardwareStatus::Poc
                    && snapshot.state.current_poc_status == PocStatus::Validating
            })
            .cloned()
            .collect()
    }

    /// Validate every on-chain batch of one stage.
    pub async fn run_stage(self: Arc<Self>, stage_height: BlockHeight) -> Result<StageStats> {
        info!(stage = stage_height, "[ig-06] V1 validation stage starting");
        let snapshot = self.tracker.snapshot();

        let sampling_hash = if snapshot.block_hash.is_empty() {
            self.bridge
                .block_hash(snapshot.block_height)
                .await
                .map_err(|e| ValidationError::Aborted(format!("no sampling hash: {e}")))?
        } else {
            snapshot.block_hash.clone()
        };

        let params = self
            .bridge
            .params()
            .await
            .map_err(|e| ValidationError::Chain(e.to_string()))?;
        let sample_size = if params.poc.validation_sample_size == 0 {
            DEFAULT_SAMPLE_SIZE
        } else {
            params.poc.validation_sample_size
        };

        let mut eligible = Vec::new();
        for attempt in 1..=self.config.fleet_retry_attempts {
            let nodes = self
                .broker
                .get_nodes()
                .await
                .map_err(|e| ValidationError::Aborted(e.to_string()))?;
            eligible = Self::eligible(&nodes);
            if !eligible.is_empty() {
                break;
            }
            debug!(attempt, "[ig-06] No validating nodes yet");
            if attempt < self.config.fleet_retry_attempts {
                tokio::time::sleep(self.config.fleet_retry_delay).await;
            }
        }
        if eligible.is_empty() {
            return Err(ValidationError::Aborted(
                "no validating ML nodes for V1".to_string(),
            ));
        }

        let batches = self
            .bridge
            .poc_batches_for_stage(stage_height)
            .await
            .map_err(|e| ValidationError::Chain(e.to_string()))?;

        let mut stats = StageStats::default();
        let retry_budget = POC_VALIDATE_BATCH_RETRIES.max(eligible.len() as u32);

        for (participant, batch) in batches {
            if participant == self.signer.address() {
                continue;
            }
            if batch.nonces.is_empty() || batch.nonces.len() != batch.dist.len() {
                warn!(participant = %participant, "[ig-06] Malformed V1 batch");
                stats.fail += 1;
                continue;
            }

            let indices = sample_leaf_indices(
                &self.signer.pubkey_hex(),
                &sampling_hash,
                stage_height,
                batch.nonces.len() as u32,
                sample_size,
            );
            let sampled = PocBatchV1 {
                public_key: participant.clone(),
                block_height: stage_height,
                nonces: indices.iter().map(|&i| batch.nonces[i as usize]).collect(),
                dist: indices.iter().map(|&i| batch.dist[i as usize]).collect(),
            };

            let mut delivered = false;
            for attempt in 0..retry_budget {
                let node = &eligible[(attempt as usize) % eligible.len()];
                let client = self
                    .factory
                    .create(&node.node.config.poc_url(), &node.node.config.inference_url());
                match client.validate_batch_v1(&sampled).await {
                    Ok(()) => {
                        delivered = true;
                        break;
                    }
                    Err(e) => {
                        debug!(
                            participant = %participant,
                            node = %node.node.config.id,
                            attempt,
                            "[ig-06] V1 dispatch failed: {e}"
                        );
                    }
                }
            }

            if delivered {
                grid_telemetry::VALIDATIONS_SUCCEEDED
                    .with_label_values(&["v1"])
                    .inc();
                stats.success += 1;
            } else {
                grid_telemetry::VALIDATIONS_FAILED
                    .with_label_values(&["v1"])
                    .inc();
                warn!(participant = %participant, "[ig-06] V1 retry budget exhausted");
                stats.fail += 1;
            }
        }

        info!(
            stage = stage_height,
            success = stats.success,
            fail = stats.fail,
            "[ig-06] V1 validation stage finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_01_ml_client::MockClientFactory;
    use ig_02_chain_bridge::{MockChainBridge, Secp256k1Signer};
    use ig_04_broker::{Broker, BrokerConfig, BrokerIdentity, StatusUpdate};
    use shared_types::{
        EpochPhase, MlNodeConfig, ModelSpec, MsgPocBatch, PhaseSnapshot,
    };

    async fn harness() -> (
        Arc<OnChainValidator>,
        Arc<MockChainBridge>,
        Arc<MockClientFactory>,
    ) {
        let bridge = Arc::new(MockChainBridge::new());
        let factory = Arc::new(MockClientFactory::new());
        let signer =
            Arc::new(Secp256k1Signer::new(&[9u8; 32], "grid1validator".to_string()).unwrap());

        // Unsynced tracker: the broker reconciler stays quiet and the
        // statuses set below stick.
        let tracker = Arc::new(PhaseTracker::new());

        let (broker, _join) = Broker::spawn(
            BrokerConfig::default(),
            BrokerIdentity::default(),
            factory.clone(),
            bridge.clone(),
            tracker.clone(),
        );
        broker
            .register_node(MlNodeConfig {
                id: "local1".to_string(),
                host: "localhost".to_string(),
                inference_port: 8080,
                poc_port: 5000,
                inference_segment: String::new(),
                poc_segment: String::new(),
                max_concurrent: 1,
                models: vec![ModelSpec {
                    id: "model1".to_string(),
                    args: vec![],
                }],
                hardware: vec![],
            })
            .await
            .unwrap();
        broker
            .set_nodes_actual_status(vec![StatusUpdate {
                node_id: "local1".to_string(),
                status: HardwareStatus::Poc,
                poc_status: PocStatus::Validating,
            }])
            .await
            .unwrap();

        tracker.update(PhaseSnapshot {
            block_height: 150,
            block_hash: "SAMPLING".to_string(),
            epoch_index: 3,
            poc_start_block_height: 100,
            poc_start_block_hash: "SEED".to_string(),
            current_phase: EpochPhase::PocValidate,
            active_confirmation_event: None,
            is_synced: false,
            poc_v2_enabled: false,
            confirmation_poc_v2_enabled: false,
        });

        let validator = Arc::new(OnChainValidator::new(
            bridge.clone(),
            broker,
            tracker,
            factory.clone(),
            signer,
            OnChainConfig {
                fleet_retry_attempts: 3,
                fleet_retry_delay: Duration::from_millis(10),
            },
        ));
        (validator, bridge, factory)
    }

    fn batch(len: usize) -> MsgPocBatch {
        MsgPocBatch {
            poc_stage_start_block_height: 100,
            nonces: (0..len as i64).collect(),
            dist: (0..len).map(|i| i as f64 / len as f64).collect(),
        }
    }

    #[tokio::test]
    async fn test_batches_are_sampled_and_forwarded() {
        let (validator, bridge, factory) = harness().await;
        bridge.set_poc_batches(
            100,
            vec![
                ("grid1aaa".to_string(), batch(1000)),
                ("grid1bbb".to_string(), batch(50)),
            ],
        );

        let stats = validator.run_stage(100).await.unwrap();
        assert_eq!(stats.success, 2);
        assert_eq!(stats.fail, 0);
        assert_eq!(
            factory.client_for("http://localhost:5000").calls("validate_batch_v1"),
            2
        );
    }

    #[tokio::test]
    async fn test_unreachable_node_exhausts_budget() {
        let (validator, bridge, factory) = harness().await;
        bridge.set_poc_batches(100, vec![("grid1aaa".to_string(), batch(10))]);
        let mock = factory.client_for("http://localhost:5000");
        mock.fail_method("validate_batch_v1", "connection refused");

        let stats = validator.run_stage(100).await.unwrap();
        assert_eq!(stats.fail, 1);
        // Budget is max(5, |eligible|) = 5 with a single node.
        assert_eq!(mock.calls("validate_batch_v1"), 5);
    }

    #[tokio::test]
    async fn test_malformed_batch_is_failed_without_dispatch() {
        let (validator, bridge, factory) = harness().await;
        let mut malformed = batch(4);
        malformed.dist.pop();
        bridge.set_poc_batches(100, vec![("grid1aaa".to_string(), malformed)]);

        let stats = validator.run_stage(100).await.unwrap();
        assert_eq!(stats.fail, 1);
        assert_eq!(
            factory.client_for("http://localhost:5000").calls("validate_batch_v1"),
            0
        );
    }
}
