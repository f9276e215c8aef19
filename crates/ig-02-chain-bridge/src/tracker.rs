//! PhaseTracker: the write-rarely/read-often snapshot of chain time.

use std::sync::RwLock;

use shared_types::{EpochPhase, PhaseSnapshot};

/// Holds the latest [`PhaseSnapshot`].
///
/// The chain follower is the only writer. Readers always receive an owned
/// clone; no reference to the interior ever escapes, so readers can never
/// observe a torn or later-mutated snapshot.
pub struct PhaseTracker {
    snapshot: RwLock<PhaseSnapshot>,
}

impl PhaseTracker {
    /// Tracker starting unsynced at height zero in Inference.
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(PhaseSnapshot {
                block_height: 0,
                block_hash: String::new(),
                epoch_index: 0,
                poc_start_block_height: 0,
                poc_start_block_hash: String::new(),
                current_phase: EpochPhase::Inference,
                active_confirmation_event: None,
                is_synced: false,
                poc_v2_enabled: false,
                confirmation_poc_v2_enabled: false,
            }),
        }
    }

    /// Current snapshot, by value.
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.snapshot.read().expect("phase tracker poisoned").clone()
    }

    /// Replace the snapshot. Follower-only.
    pub fn update(&self, snapshot: PhaseSnapshot) {
        *self.snapshot.write().expect("phase tracker poisoned") = snapshot;
    }

    /// Mark the tracker unsynced without losing the last known position.
    pub fn mark_unsynced(&self) {
        self.snapshot
            .write()
            .expect("phase tracker poisoned")
            .is_synced = false;
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_a_value_copy() {
        let tracker = PhaseTracker::new();
        let before = tracker.snapshot();

        let mut next = before.clone();
        next.block_height = 42;
        next.is_synced = true;
        tracker.update(next);

        // The earlier copy is unaffected by the update.
        assert_eq!(before.block_height, 0);
        assert_eq!(tracker.snapshot().block_height, 42);
        assert!(tracker.snapshot().is_synced);
    }

    #[test]
    fn test_mark_unsynced_keeps_position() {
        let tracker = PhaseTracker::new();
        let mut snap = tracker.snapshot();
        snap.block_height = 10;
        snap.is_synced = true;
        tracker.update(snap);

        tracker.mark_unsynced();
        let after = tracker.snapshot();
        assert_eq!(after.block_height, 10);
        assert!(!after.is_synced);
    }
}
