//! Stage store registry: keyed by stage height, LRU capped, phase gated.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use ig_02_chain_bridge::PhaseTracker;
use shared_types::{Artifact, BlockHeight};
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::store::StageStore;
use crate::DEFAULT_MAX_STAGES;

struct RegistryInner {
    stores: HashMap<BlockHeight, Arc<StageStore>>,
    /// Access order, least recently used at the front.
    order: VecDeque<BlockHeight>,
}

/// Owns every live [`StageStore`] and applies the acceptance gate on the
/// generated-artifact write path.
pub struct StoreRegistry {
    tracker: Arc<PhaseTracker>,
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl StoreRegistry {
    /// Registry with the default stage cap.
    pub fn new(tracker: Arc<PhaseTracker>) -> Self {
        Self::with_capacity(tracker, DEFAULT_MAX_STAGES)
    }

    /// Registry with a custom stage cap (at least 1).
    pub fn with_capacity(tracker: Arc<PhaseTracker>, capacity: usize) -> Self {
        Self {
            tracker,
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner {
                stores: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn touch(inner: &mut RegistryInner, stage: BlockHeight) {
        inner.order.retain(|&s| s != stage);
        inner.order.push_back(stage);
    }

    /// The store for a stage, created on first use. Creating beyond the
    /// cap prunes the least recently used stage.
    pub fn get_or_create(&self, stage: BlockHeight) -> Arc<StageStore> {
        let mut inner = self.inner.lock().expect("store registry poisoned");
        if let Some(store) = inner.stores.get(&stage).cloned() {
            Self::touch(&mut inner, stage);
            return store;
        }

        let store = Arc::new(StageStore::new(stage));
        inner.stores.insert(stage, store.clone());
        Self::touch(&mut inner, stage);
        info!(stage, "[ig-03] Stage store created");

        while inner.stores.len() > self.capacity {
            if let Some(pruned) = inner.order.pop_front() {
                inner.stores.remove(&pruned);
                info!(stage = pruned, "[ig-03] Stage store pruned (LRU)");
            }
        }
        store
    }

    /// The store for a stage, if retained.
    pub fn get(&self, stage: BlockHeight) -> Option<Arc<StageStore>> {
        let mut inner = self.inner.lock().expect("store registry poisoned");
        let store = inner.stores.get(&stage).cloned();
        if store.is_some() {
            Self::touch(&mut inner, stage);
        }
        store
    }

    /// Gated append of one generated artifact.
    ///
    /// Admitted only while the phase tracker reports the matching stage in
    /// its generation window (regular PoCGenerate, or the generation
    /// sub-phase of a confirmation event on the same trigger height).
    pub fn append_generated(&self, stage: BlockHeight, artifact: &Artifact) -> Result<()> {
        let snapshot = self.tracker.snapshot();
        if !snapshot.should_accept_generated_artifacts(stage) {
            grid_telemetry::ARTIFACTS_REJECTED
                .with_label_values(&["out_of_window"])
                .inc();
            warn!(
                stage,
                height = snapshot.block_height,
                phase = ?snapshot.current_phase,
                "[ig-03] Artifact rejected: stage not generating"
            );
            return Err(StoreError::OutOfWindow {
                stage,
                height: snapshot.block_height,
            });
        }

        let store = self.get_or_create(stage);
        store
            .add_with_node(artifact.nonce, artifact.vector.clone(), &artifact.node_id)
            .map_err(|e| {
                grid_telemetry::ARTIFACTS_REJECTED
                    .with_label_values(&["invalid_vector"])
                    .inc();
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{EpochPhase, PhaseSnapshot, VECTOR_BYTES};

    fn tracker_in(phase: EpochPhase, stage: BlockHeight) -> Arc<PhaseTracker> {
        let tracker = Arc::new(PhaseTracker::new());
        tracker.update(PhaseSnapshot {
            block_height: stage + 5,
            block_hash: "H".to_string(),
            epoch_index: 1,
            poc_start_block_height: stage,
            poc_start_block_hash: "STAGE".to_string(),
            current_phase: phase,
            active_confirmation_event: None,
            is_synced: true,
            poc_v2_enabled: true,
            confirmation_poc_v2_enabled: false,
        });
        tracker
    }

    fn artifact(nonce: i32) -> Artifact {
        Artifact {
            nonce,
            vector: vec![0u8; VECTOR_BYTES],
            node_id: "node1".to_string(),
        }
    }

    #[test]
    fn test_append_gated_by_phase() {
        let registry = StoreRegistry::new(tracker_in(EpochPhase::PocGenerate, 100));
        registry.append_generated(100, &artifact(1)).unwrap();

        // Wrong stage is rejected even while generating.
        let err = registry.append_generated(90, &artifact(2)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfWindow { stage: 90, .. }));

        let registry = StoreRegistry::new(tracker_in(EpochPhase::Inference, 100));
        let err = registry.append_generated(100, &artifact(3)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfWindow { .. }));
    }

    #[test]
    fn test_lru_prunes_oldest_stage() {
        let registry =
            StoreRegistry::with_capacity(tracker_in(EpochPhase::PocGenerate, 100), 2);
        registry.get_or_create(100);
        registry.get_or_create(200);
        // Touch 100 so 200 becomes the eviction candidate.
        registry.get(100);
        registry.get_or_create(300);

        assert!(registry.get(100).is_some());
        assert!(registry.get(200).is_none());
        assert!(registry.get(300).is_some());
    }

    #[test]
    fn test_same_stage_returns_same_store() {
        let registry = StoreRegistry::new(tracker_in(EpochPhase::PocGenerate, 100));
        let a = registry.get_or_create(100);
        let b = registry.get_or_create(100);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
