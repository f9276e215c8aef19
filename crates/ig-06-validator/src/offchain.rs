//! V2 off-chain validation: the per-stage work queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ig_01_ml_client::{MlClientFactory, PocGenerateRequestV2, PocModelParams, PocValidationPayload};
use ig_02_chain_bridge::{ChainBridge, PhaseTracker, Signer};
use rand::seq::SliceRandom;
use shared_types::{
    BlockHeight, MsgPocValidationsV2, NodeSnapshot, PocValidation, StatTestParams,
};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, ValidationError};
use crate::fleet::get_nodes_with_retry;
use crate::proofs::{check_duplicate_nonces, ProofProvider, ProofQuery};
use crate::sampling::sample_leaf_indices;
use crate::slots::is_assigned;

/// Default sample size applied when the chain parameter is zero.
pub const DEFAULT_SAMPLE_SIZE: u32 = 200;

/// Off-chain validator tuning knobs.
#[derive(Debug, Clone)]
pub struct OffChainConfig {
    /// Worker pool size cap.
    pub worker_count: usize,
    /// Attempts per participant before marking it failed.
    pub max_retries: u32,
    /// Delay before a retryable failure is due again.
    pub retry_backoff: Duration,
    /// Fleet snapshot retry attempts.
    pub fleet_retry_attempts: u32,
    /// Delay between fleet snapshot attempts.
    pub fleet_retry_delay: Duration,
    /// Public base URL of this node's callback API.
    pub callback_url: String,
}

impl Default for OffChainConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            max_retries: 3,
            retry_backoff: Duration::from_secs(5),
            fleet_retry_attempts: 30,
            fleet_retry_delay: Duration::from_secs(5),
            callback_url: "http://localhost:9000".to_string(),
        }
    }
}

/// End-of-stage accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Participants validated and forwarded successfully.
    pub success: usize,
    /// Participants failed (permanent or retries exhausted).
    pub fail: usize,
    /// Participants still in flight (zero after a completed stage).
    pub pending: usize,
}

/// One unit of per-participant work.
#[derive(Debug, Clone)]
struct ParticipantWork {
    address: String,
    url: String,
    pubkey_hex: String,
    count: u32,
    root_hash: Vec<u8>,
    node_count: u32,
    attempt: u32,
    retry_after: Option<Instant>,
}

struct StageContext {
    stage_height: BlockHeight,
    generation_seed_hash: String,
    sampling_hash: String,
    sample_size: u32,
    model_id: String,
    seq_len: u32,
    stat_test: StatTestParams,
    local_nodes: Vec<NodeSnapshot>,
    next_node: AtomicUsize,
}

struct StageShared {
    queue_tx: mpsc::Sender<ParticipantWork>,
    queue_rx: tokio::sync::Mutex<mpsc::Receiver<ParticipantWork>>,
    stats: Mutex<StageStats>,
    cancel: watch::Sender<bool>,
}

/// The V2 off-chain validator.
pub struct OffChainValidator {
    bridge: Arc<dyn ChainBridge>,
    broker: ig_04_broker::BrokerHandle,
    tracker: Arc<PhaseTracker>,
    proofs: Arc<dyn ProofProvider>,
    factory: Arc<dyn MlClientFactory>,
    signer: Arc<dyn Signer>,
    config: OffChainConfig,
}

impl OffChainValidator {
    /// Wire a validator; stages are run via [`Self::run_stage`].
    pub fn new(
        bridge: Arc<dyn ChainBridge>,
        broker: ig_04_broker::BrokerHandle,
        tracker: Arc<PhaseTracker>,
        proofs: Arc<dyn ProofProvider>,
        factory: Arc<dyn MlClientFactory>,
        signer: Arc<dyn Signer>,
        config: OffChainConfig,
    ) -> Self {
        Self {
            bridge,
            broker,
            tracker,
            proofs,
            factory,
            signer,
            config,
        }
    }

    /// Validate every assigned participant of one stage. At most once per
    /// stage; the orchestrator enforces that.
    pub async fn run_stage(
        self: Arc<Self>,
        stage_height: BlockHeight,
        poc_start_block_hash: &str,
    ) -> Result<StageStats> {
        info!(stage = stage_height, "[ig-06] V2 validation stage starting");
        let snapshot = self.tracker.snapshot();

        // 1. Sampling seed: the confirmation event's seed when it drives
        //    this stage, otherwise the current block hash, otherwise RPC.
        let sampling_hash = match &snapshot.active_confirmation_event {
            Some(event) if event.trigger_height == stage_height => {
                event.poc_seed_block_hash.clone()
            }
            _ if !snapshot.block_hash.is_empty() => snapshot.block_hash.clone(),
            _ => self
                .bridge
                .block_hash(snapshot.block_height)
                .await
                .map_err(|e| ValidationError::Aborted(format!("no sampling hash: {e}")))?,
        };

        // 2. Chain parameters.
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

        // 3. Local fleet, with retry.
        let local_nodes = get_nodes_with_retry(
            &self.broker,
            self.config.fleet_retry_attempts,
            self.config.fleet_retry_delay,
        )
        .await?;

        // 4. Stop generation everywhere before validating.
        let mut stop_errors = 0;
        for node in &local_nodes {
            let client = self
                .factory
                .create(&node.node.config.poc_url(), &node.node.config.inference_url());
            if let Err(e) = client.stop_pow_v2().await {
                stop_errors += 1;
                warn!(node = %node.node.config.id, "[ig-06] StopPow failed: {e}");
            }
        }
        if stop_errors > 0 {
            warn!(stop_errors, "[ig-06] Some nodes kept generating");
        }

        // 5. Commits for the stage.
        let commits = self
            .bridge
            .store_commits_for_stage(stage_height)
            .await
            .map_err(|e| ValidationError::Chain(e.to_string()))?;

        // 6. Slot assignment.
        let validation_snapshot = if params.poc.validation_slots > 0 {
            self.bridge
                .validation_snapshot(stage_height)
                .await
                .map_err(|e| ValidationError::Chain(e.to_string()))?
        } else {
            None
        };

        // 7. Build the work list.
        let mut work_items = Vec::new();
        for commit in commits {
            if commit.participant == self.signer.address() {
                continue;
            }
            if let Some(validation) = &validation_snapshot {
                if !is_assigned(
                    &validation.app_hash,
                    &commit.participant,
                    &validation.validator_weights,
                    params.poc.validation_slots,
                    self.signer.address(),
                ) {
                    debug!(participant = %commit.participant, "[ig-06] Not our slot");
                    continue;
                }
            }

            let url = match self.bridge.participant(&commit.participant).await {
                Ok(info) => info.inference_url,
                Err(e) => {
                    warn!(participant = %commit.participant, "[ig-06] No participant record: {e}");
                    continue;
                }
            };
            if url.is_empty() || commit.hex_pubkey.is_empty() {
                warn!(participant = %commit.participant, "[ig-06] Missing url or pubkey; dropped");
                continue;
            }

            work_items.push(ParticipantWork {
                address: commit.participant.clone(),
                url,
                pubkey_hex: commit.hex_pubkey.clone(),
                count: commit.count,
                root_hash: commit.root_hash.clone(),
                node_count: commit.node_count(),
                attempt: 0,
                retry_after: None,
            });
        }

        if work_items.is_empty() {
            info!(stage = stage_height, "[ig-06] Nothing to validate");
            return Ok(StageStats::default());
        }

        // 8. Randomized order, buffered queue, bounded worker pool.
        work_items.shuffle(&mut rand::thread_rng());
        let pending = work_items.len();
        let (queue_tx, queue_rx) = mpsc::channel(pending * 2);
        for work in work_items {
            queue_tx.try_send(work).expect("queue sized for all items");
        }

        let (cancel, _) = watch::channel(false);
        let shared = Arc::new(StageShared {
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            stats: Mutex::new(StageStats {
                success: 0,
                fail: 0,
                pending,
            }),
            cancel,
        });
        let context = Arc::new(StageContext {
            stage_height,
            generation_seed_hash: poc_start_block_hash.to_string(),
            sampling_hash,
            sample_size,
            model_id: params.poc.model_id.clone(),
            seq_len: params.poc.seq_len,
            stat_test: params.poc.stat_test,
            local_nodes,
            next_node: AtomicUsize::new(0),
        });

        let worker_count = self.config.worker_count.min(pending).max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for worker_index in 0..worker_count {
            let validator = self.clone();
            let shared = shared.clone();
            let context = context.clone();
            handles.push(tokio::spawn(async move {
                validator.worker_loop(worker_index, shared, context).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let stats = *shared.stats.lock().expect("stage stats poisoned");
        info!(
            stage = stage_height,
            success = stats.success,
            fail = stats.fail,
            "[ig-06] V2 validation stage finished"
        );
        Ok(stats)
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker_index: usize,
        shared: Arc<StageShared>,
        context: Arc<StageContext>,
    ) {
        let mut cancel = shared.cancel.subscribe();
        loop {
            if *cancel.borrow() {
                break;
            }
            let work = tokio::select! {
                _ = cancel.changed() => continue,
                work = async { shared.queue_rx.lock().await.recv().await } => match work {
                    Some(work) => work,
                    None => break,
                },
            };

            // Items not yet due go back to the tail.
            if let Some(due) = work.retry_after {
                let now = Instant::now();
                if now < due {
                    let wait = (due - now).min(Duration::from_millis(100));
                    match shared.queue_tx.try_send(work) {
                        Ok(()) => {
                            tokio::time::sleep(wait).await;
                            continue;
                        }
                        Err(e) => {
                            let work = e.into_inner();
                            warn!(participant = %work.address, "[ig-06] Queue full on re-queue");
                            self.complete(&shared, false);
                            continue;
                        }
                    }
                }
            }

            let address = work.address.clone();
            match self.validate_participant(&context, &work).await {
                Ok(()) => {
                    debug!(worker = worker_index, participant = %address, "[ig-06] Validated");
                    grid_telemetry::VALIDATIONS_SUCCEEDED
                        .with_label_values(&["v2"])
                        .inc();
                    self.complete(&shared, true);
                }
                Err(e) if e.is_permanent() => {
                    warn!(participant = %address, "[ig-06] Permanent failure: {e}");
                    self.submit_invalidity(context.stage_height, &address).await;
                    grid_telemetry::VALIDATIONS_FAILED
                        .with_label_values(&["v2"])
                        .inc();
                    self.complete(&shared, false);
                }
                Err(e) => {
                    let mut work = work;
                    work.attempt += 1;
                    if work.attempt >= self.config.max_retries {
                        warn!(
                            participant = %address,
                            attempts = work.attempt,
                            "[ig-06] Retries exhausted: {e}"
                        );
                        grid_telemetry::VALIDATIONS_FAILED
                            .with_label_values(&["v2"])
                            .inc();
                        self.complete(&shared, false);
                    } else {
                        debug!(
                            participant = %address,
                            attempt = work.attempt,
                            "[ig-06] Retryable failure: {e}"
                        );
                        work.retry_after = Some(Instant::now() + self.config.retry_backoff);
                        if shared.queue_tx.try_send(work).is_err() {
                            warn!(participant = %address, "[ig-06] Queue full; marking failed");
                            grid_telemetry::VALIDATIONS_FAILED
                                .with_label_values(&["v2"])
                                .inc();
                            self.complete(&shared, false);
                        }
                    }
                }
            }
        }
    }

    fn complete(&self, shared: &StageShared, success: bool) {
        let mut stats = shared.stats.lock().expect("stage stats poisoned");
        if success {
            stats.success += 1;
        } else {
            stats.fail += 1;
        }
        stats.pending = stats.pending.saturating_sub(1);
        if stats.pending == 0 {
            let _ = shared.cancel.send(true);
        }
    }

    async fn submit_invalidity(&self, stage_height: BlockHeight, participant: &str) {
        let msg = MsgPocValidationsV2 {
            poc_stage_start_block_height: stage_height,
            validations: vec![PocValidation {
                participant: participant.to_string(),
                validated_weight: -1,
            }],
        };
        if let Err(e) = self.bridge.submit_poc_validations_v2(msg).await {
            warn!(participant, "[ig-06] Invalidity submission failed: {e}");
        }
    }

    async fn validate_participant(
        &self,
        context: &StageContext,
        work: &ParticipantWork,
    ) -> Result<()> {
        // a. Deterministic sample over the committed leaves.
        let leaf_indices = sample_leaf_indices(
            &self.signer.pubkey_hex(),
            &context.sampling_hash,
            context.stage_height,
            work.count,
            context.sample_size,
        );
        if leaf_indices.is_empty() {
            return Err(ValidationError::IncompleteCoverage(
                "commit carries zero leaves".to_string(),
            ));
        }

        // b. Fetch and verify inclusion proofs.
        let query = ProofQuery {
            stage_height: context.stage_height,
            root_hash: work.root_hash.clone(),
            count: work.count,
            leaf_indices,
            participant_address: work.address.clone(),
        };
        let artifacts = self.proofs.fetch_and_verify(&work.url, &query).await?;

        // c. Fraud: repeated nonces inside the sample.
        check_duplicate_nonces(&artifacts)?;

        // d. Forward to a local node for statistical recomputation. The
        //    generation seed hash is used here, not the sampling hash.
        let node = &context.local_nodes
            [context.next_node.fetch_add(1, Ordering::Relaxed) % context.local_nodes.len()];
        let client = self
            .factory
            .create(&node.node.config.poc_url(), &node.node.config.inference_url());
        let request = PocGenerateRequestV2 {
            block_hash: context.generation_seed_hash.clone(),
            block_height: context.stage_height,
            public_key: work.pubkey_hex.clone(),
            node_count: work.node_count,
            nonces: artifacts.iter().map(|a| a.nonce).collect(),
            params: PocModelParams {
                model: context.model_id.clone(),
                seq_len: context.seq_len,
            },
            url: format!(
                "{}/v2/poc-batches",
                self.config.callback_url.trim_end_matches('/')
            ),
            validation: PocValidationPayload { artifacts },
            stat_test: context.stat_test,
        };
        client
            .generate_v2(&request)
            .await
            .map_err(|e| ValidationError::MlNode(e.to_string()))
    }
}
