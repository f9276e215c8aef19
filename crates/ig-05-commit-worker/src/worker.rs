//! The commit ticker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ig_02_chain_bridge::{ChainBridge, PhaseTracker};
use ig_03_artifact_store::{mmr::Hash, StoreRegistry};
use shared_types::{BlockHeight, MsgStoreCommit, MsgWeightDistribution, PhaseSnapshot};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::weights::get_weight_distribution;

/// Commit worker tuning knobs.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Tick period.
    pub tick_interval: Duration,
    /// Minimum spacing between weight-distribution attempts.
    pub distribution_retry_interval: Duration,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            distribution_retry_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct CommitState {
    current_stage: BlockHeight,
    /// `(count, root)` of the last accepted (or rejected) commit.
    last_committed: Option<(u32, Hash)>,
    last_distribution_attempt: Option<Instant>,
}

/// Publishes store commits and weight distributions for the active stage.
pub struct CommitWorker {
    bridge: Arc<dyn ChainBridge>,
    registry: Arc<StoreRegistry>,
    tracker: Arc<PhaseTracker>,
    config: CommitConfig,
    state: Mutex<CommitState>,
}

impl CommitWorker {
    /// Wire a worker; call [`Self::run`] on a task.
    pub fn new(
        bridge: Arc<dyn ChainBridge>,
        registry: Arc<StoreRegistry>,
        tracker: Arc<PhaseTracker>,
        config: CommitConfig,
    ) -> Self {
        Self {
            bridge,
            registry,
            tracker,
            config,
            state: Mutex::new(CommitState::default()),
        }
    }

    /// Run until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[ig-05] Commit worker starting (tick {:?})",
            self.config.tick_interval
        );
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[ig-05] Commit worker stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One pass: stage bookkeeping, commit window, distribution window.
    pub async fn tick(&self) {
        let snapshot = self.tracker.snapshot();
        if !snapshot.is_synced {
            return;
        }

        let stage = snapshot.active_stage_height();
        {
            let mut state = self.state.lock().expect("commit state poisoned");
            if state.current_stage != stage {
                debug!(
                    from = state.current_stage,
                    to = stage,
                    "[ig-05] Stage changed; memo reset"
                );
                state.current_stage = stage;
                state.last_committed = None;
                state.last_distribution_attempt = None;
            }
        }

        if snapshot.should_accept_store_commit(stage) {
            self.maybe_submit_commit(stage).await;
        }

        if snapshot.should_have_distributed_weights() && self.distribution_attempt_due() {
            self.submit_distribution(&snapshot).await;
        }
    }

    fn distribution_attempt_due(&self) -> bool {
        let state = self.state.lock().expect("commit state poisoned");
        match state.last_distribution_attempt {
            None => true,
            Some(last) => last.elapsed() >= self.config.distribution_retry_interval,
        }
    }

    async fn maybe_submit_commit(&self, stage: BlockHeight) {
        let Some(store) = self.registry.get(stage) else {
            return;
        };
        store.flush();
        let snapshot = store.snapshot();
        if snapshot.count == 0 {
            return;
        }

        {
            let state = self.state.lock().expect("commit state poisoned");
            if state.last_committed == Some((snapshot.count, snapshot.root)) {
                return;
            }
        }

        let msg = MsgStoreCommit {
            poc_stage_start_block_height: stage,
            root_hash: snapshot.root.to_vec(),
            count: snapshot.count,
            per_node_distribution: snapshot.distribution.clone(),
        };

        match self.bridge.submit_store_commit(msg).await {
            Ok(()) => {
                info!(stage, count = snapshot.count, "[ig-05] Store commit submitted");
                grid_telemetry::COMMITS_SUBMITTED.inc();
                let mut state = self.state.lock().expect("commit state poisoned");
                state.last_committed = Some((snapshot.count, snapshot.root));
            }
            Err(e) if e.is_retryable() => {
                warn!(stage, "[ig-05] Store commit submission failed, will retry: {e}");
            }
            Err(e) => {
                // The chain said no (window closed, deprecated route);
                // memoize so this exact state is not re-submitted.
                warn!(stage, "[ig-05] Store commit rejected: {e}");
                let mut state = self.state.lock().expect("commit state poisoned");
                state.last_committed = Some((snapshot.count, snapshot.root));
            }
        }
    }

    async fn submit_distribution(&self, snapshot: &PhaseSnapshot) {
        let stage = snapshot.active_stage_height();
        let Some(store) = self.registry.get(stage) else {
            return;
        };
        let store_snapshot = store.snapshot();
        if store_snapshot.count == 0 {
            return;
        }

        {
            let mut state = self.state.lock().expect("commit state poisoned");
            state.last_distribution_attempt = Some(Instant::now());
        }

        // Target: committed count scaled by the chain's percentage factor.
        let scale = match self.bridge.params().await {
            Ok(params) => u64::from(params.poc.weight_scale_factor.max(1)),
            Err(e) => {
                warn!("[ig-05] Params query failed before distribution: {e}");
                return;
            }
        };
        let target = (u64::from(store_snapshot.count) * scale / 100).max(1) as u32;

        let weights = match get_weight_distribution(&store_snapshot.distribution, target) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(stage, "[ig-05] Weight distribution not derivable: {e}");
                return;
            }
        };

        let msg = MsgWeightDistribution {
            poc_stage_start_block_height: stage,
            weights,
        };
        match self.bridge.submit_weight_distribution(msg).await {
            Ok(()) => info!(stage, "[ig-05] Weight distribution submitted"),
            Err(e) => warn!(stage, "[ig-05] Weight distribution failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_02_chain_bridge::MockChainBridge;
    use shared_types::{ChainParams, EpochPhase, VECTOR_BYTES};

    fn snapshot_in(phase: EpochPhase, stage: BlockHeight) -> PhaseSnapshot {
        PhaseSnapshot {
            block_height: stage + 10,
            block_hash: "HEAD".to_string(),
            epoch_index: 2,
            poc_start_block_height: stage,
            poc_start_block_hash: "SEED".to_string(),
            current_phase: phase,
            active_confirmation_event: None,
            is_synced: true,
            poc_v2_enabled: true,
            confirmation_poc_v2_enabled: false,
        }
    }

    struct Harness {
        worker: CommitWorker,
        bridge: Arc<MockChainBridge>,
        registry: Arc<StoreRegistry>,
        tracker: Arc<PhaseTracker>,
    }

    fn harness(phase: EpochPhase, stage: BlockHeight) -> Harness {
        let bridge = Arc::new(MockChainBridge::new());
        bridge.set_params(ChainParams::default());
        let tracker = Arc::new(PhaseTracker::new());
        tracker.update(snapshot_in(phase, stage));
        let registry = Arc::new(StoreRegistry::new(tracker.clone()));
        let worker = CommitWorker::new(
            bridge.clone(),
            registry.clone(),
            tracker.clone(),
            CommitConfig::default(),
        );
        Harness {
            worker,
            bridge,
            registry,
            tracker,
        }
    }

    fn fill_store(registry: &StoreRegistry, stage: BlockHeight, nonces: std::ops::Range<i32>) {
        let store = registry.get_or_create(stage);
        for nonce in nonces {
            store
                .add_with_node(nonce, vec![0u8; VECTOR_BYTES], "node1")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_commit_submitted_once_per_store_state() {
        let h = harness(EpochPhase::PocGenerate, 100);
        fill_store(&h.registry, 100, 0..5);

        h.worker.tick().await;
        h.worker.tick().await;
        assert_eq!(h.bridge.submissions().store_commits.len(), 1);
        assert_eq!(h.bridge.submissions().store_commits[0].count, 5);

        // New artifacts change (count, root): a second commit goes out.
        fill_store(&h.registry, 100, 5..8);
        h.worker.tick().await;
        let submissions = h.bridge.submissions();
        assert_eq!(submissions.store_commits.len(), 2);
        assert_eq!(submissions.store_commits[1].count, 8);
    }

    #[tokio::test]
    async fn test_no_commit_outside_exchange_window() {
        let h = harness(EpochPhase::Inference, 100);
        fill_store(&h.registry, 100, 0..5);

        h.worker.tick().await;
        assert!(h.bridge.submissions().store_commits.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_is_not_committed() {
        let h = harness(EpochPhase::PocGenerate, 100);
        h.registry.get_or_create(100);

        h.worker.tick().await;
        assert!(h.bridge.submissions().store_commits.is_empty());
    }

    #[tokio::test]
    async fn test_stage_change_resets_memo() {
        let h = harness(EpochPhase::PocGenerate, 100);
        fill_store(&h.registry, 100, 0..5);
        h.worker.tick().await;
        assert_eq!(h.bridge.submissions().store_commits.len(), 1);

        // Next epoch: same content in a fresh stage store commits again.
        h.tracker.update(snapshot_in(EpochPhase::PocGenerate, 820));
        fill_store(&h.registry, 820, 0..5);
        h.worker.tick().await;
        let submissions = h.bridge.submissions();
        assert_eq!(submissions.store_commits.len(), 2);
        assert_eq!(submissions.store_commits[1].poc_stage_start_block_height, 820);
    }

    #[tokio::test]
    async fn test_transport_failure_retries_next_tick() {
        let h = harness(EpochPhase::PocGenerate, 100);
        fill_store(&h.registry, 100, 0..5);

        h.bridge.set_fail_submissions(true);
        h.worker.tick().await;
        assert!(h.bridge.submissions().store_commits.is_empty());

        h.bridge.set_fail_submissions(false);
        h.worker.tick().await;
        assert_eq!(h.bridge.submissions().store_commits.len(), 1);
    }

    #[tokio::test]
    async fn test_weight_distribution_in_validation_phase() {
        let h = harness(EpochPhase::PocGenerate, 100);
        fill_store(&h.registry, 100, 0..10);
        h.worker.tick().await;

        h.tracker.update(snapshot_in(EpochPhase::PocValidate, 100));
        h.worker.tick().await;

        let submissions = h.bridge.submissions();
        assert_eq!(submissions.weight_distributions.len(), 1);
        let msg = &submissions.weight_distributions[0];
        assert_eq!(msg.poc_stage_start_block_height, 100);
        // Default scale factor is 100%: target equals committed count.
        let sum: u32 = msg.weights.iter().map(|w| w.weight).sum();
        assert_eq!(sum, 10);
    }

    #[tokio::test]
    async fn test_distribution_attempts_are_rate_limited() {
        let h = harness(EpochPhase::PocGenerate, 100);
        fill_store(&h.registry, 100, 0..10);
        h.worker.tick().await;

        h.tracker.update(snapshot_in(EpochPhase::PocValidate, 100));
        h.worker.tick().await;
        h.worker.tick().await;
        h.worker.tick().await;

        // The retry interval (30 s) has not elapsed between ticks.
        assert_eq!(h.bridge.submissions().weight_distributions.len(), 1);
    }
}
