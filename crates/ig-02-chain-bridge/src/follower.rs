//! Chain follower: the single writer of the PhaseTracker.
//!
//! Polls the bridge, derives the epoch position, and publishes edges to
//! the shared bus. Publishing is edge-triggered: consumers receive one
//! event per change, never one per poll.

use std::sync::Arc;
use std::time::Duration;

use shared_bus::{EventPublisher, GridEvent, InMemoryEventBus};
use shared_types::{ChainParams, PhaseSnapshot};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::phase::epoch_position;
use crate::ports::ChainBridge;
use crate::tracker::PhaseTracker;

/// Follower tuning knobs.
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// Poll interval against the chain daemon.
    pub poll_interval: Duration,
    /// How many polls between parameter refreshes.
    pub params_refresh_every: u32,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            params_refresh_every: 20,
        }
    }
}

/// Polls the chain and maintains the PhaseTracker.
pub struct ChainFollower {
    bridge: Arc<dyn ChainBridge>,
    tracker: Arc<PhaseTracker>,
    bus: Arc<InMemoryEventBus>,
    config: FollowerConfig,
    /// Cached `(stage_height, stage_hash)` of the last resolved stage.
    stage_seed: Option<(shared_types::BlockHeight, String)>,
}

impl ChainFollower {
    /// Wire a follower over a bridge, tracker, and bus.
    pub fn new(
        bridge: Arc<dyn ChainBridge>,
        tracker: Arc<PhaseTracker>,
        bus: Arc<InMemoryEventBus>,
        config: FollowerConfig,
    ) -> Self {
        Self {
            bridge,
            tracker,
            bus,
            config,
            stage_seed: None,
        }
    }

    /// Run until the shutdown signal flips. One poll per tick; errors mark
    /// the tracker unsynced and are retried on the next tick.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[ig-02] Chain follower starting (poll every {:?})",
            self.config.poll_interval
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut params: Option<ChainParams> = None;
        let mut polls_since_refresh = 0u32;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[ig-02] Chain follower stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if params.is_none() || polls_since_refresh >= self.config.params_refresh_every {
                        match self.bridge.params().await {
                            Ok(p) => {
                                params = Some(p);
                                polls_since_refresh = 0;
                            }
                            Err(e) => {
                                warn!("[ig-02] Params query failed: {e}");
                            }
                        }
                    }
                    polls_since_refresh += 1;

                    let Some(ref current_params) = params else {
                        self.tracker.mark_unsynced();
                        continue;
                    };

                    if let Err(e) = self.poll_once(current_params).await {
                        warn!("[ig-02] Poll failed: {e}");
                        self.tracker.mark_unsynced();
                    }
                }
            }
        }
    }

    async fn poll_once(&mut self, params: &ChainParams) -> crate::error::Result<()> {
        let block = self.bridge.latest_block().await?;
        let confirmation = self.bridge.active_confirmation_event().await?;

        let position = epoch_position(block.height, &params.epoch);
        let stage_hash = self.stage_seed_hash(position.poc_start_block_height).await;
        let next = PhaseSnapshot {
            block_height: block.height,
            block_hash: block.hash,
            epoch_index: position.epoch_index,
            poc_start_block_height: position.poc_start_block_height,
            poc_start_block_hash: stage_hash,
            current_phase: position.phase,
            active_confirmation_event: confirmation,
            is_synced: true,
            poc_v2_enabled: params.poc.poc_v2_enabled,
            confirmation_poc_v2_enabled: params.poc.confirmation_poc_v2_enabled,
        };

        let prev = self.tracker.snapshot();
        self.tracker.update(next.clone());
        self.publish_edges(&prev, &next).await;
        Ok(())
    }

    /// Resolve the stage start hash, cached per stage. An unresolvable
    /// hash leaves the field empty; consumers fall back to an RPC query.
    async fn stage_seed_hash(&mut self, stage: shared_types::BlockHeight) -> String {
        if let Some((cached_stage, cached_hash)) = &self.stage_seed {
            if *cached_stage == stage {
                return cached_hash.clone();
            }
        }
        match self.bridge.block_hash(stage).await {
            Ok(hash) => {
                self.stage_seed = Some((stage, hash.clone()));
                hash
            }
            Err(e) => {
                warn!("[ig-02] Stage seed hash query failed for {stage}: {e}");
                String::new()
            }
        }
    }

    async fn publish_edges(&self, prev: &PhaseSnapshot, next: &PhaseSnapshot) {
        if prev.block_height != next.block_height {
            self.bus
                .publish(GridEvent::BlockObserved {
                    height: next.block_height,
                    hash: next.block_hash.clone(),
                })
                .await;
        }

        if prev.epoch_index != next.epoch_index && prev.is_synced {
            info!(
                "[ig-02] Epoch advanced: {} -> {}",
                prev.epoch_index, next.epoch_index
            );
            self.bus
                .publish(GridEvent::EpochAdvanced {
                    epoch_index: next.epoch_index,
                })
                .await;
        }

        let phase_changed = prev.current_phase != next.current_phase
            || prev.poc_start_block_height != next.poc_start_block_height
            || !prev.is_synced;
        if phase_changed {
            info!(
                "[ig-02] Phase: {:?} (stage {}, height {})",
                next.current_phase, next.poc_start_block_height, next.block_height
            );
            self.bus
                .publish(GridEvent::PhaseChanged {
                    snapshot: next.clone(),
                })
                .await;
        }

        if prev.active_confirmation_event != next.active_confirmation_event {
            debug!(
                "[ig-02] Confirmation event changed: {:?}",
                next.active_confirmation_event
            );
            self.bus
                .publish(GridEvent::ConfirmationPhaseChanged {
                    event: next.active_confirmation_event.clone(),
                })
                .await;
        }
    }
}
