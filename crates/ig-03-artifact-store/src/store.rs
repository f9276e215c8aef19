//! One stage's append-only artifact log.

use std::collections::BTreeMap;
use std::sync::Mutex;

use shared_types::{Artifact, BlockHeight, NodeDistribution};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::fp16::validate_fp16_vector;
use crate::mmr::{Hash, Mmr, EMPTY_ROOT};

/// Atomic view of a store's flushed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// MMR root after the last flush.
    pub root: Hash,
    /// Leaf count after the last flush.
    pub count: u32,
    /// Per-node artifact counts, sorted by node id.
    pub distribution: NodeDistribution,
}

struct StoreInner {
    mmr: Mmr,
    /// Flushed artifacts by leaf index.
    leaves: Vec<Artifact>,
    /// Appended but not yet flushed.
    pending: Vec<Artifact>,
    /// Per-node counts over flushed artifacts.
    per_node: BTreeMap<String, u32>,
    /// Cached root of the flushed MMR.
    flushed_root: Hash,
}

/// Append-only artifact log for one PoC stage.
///
/// Appends buffer until [`StageStore::flush`]; `root()`/`count()` and
/// proof generation observe only flushed state, which is exactly what the
/// published store commit covered.
pub struct StageStore {
    stage_height: BlockHeight,
    inner: Mutex<StoreInner>,
}

impl StageStore {
    /// Empty store for a stage.
    pub fn new(stage_height: BlockHeight) -> Self {
        Self {
            stage_height,
            inner: Mutex::new(StoreInner {
                mmr: Mmr::new(),
                leaves: Vec::new(),
                pending: Vec::new(),
                per_node: BTreeMap::new(),
                flushed_root: EMPTY_ROOT,
            }),
        }
    }

    /// Stage this store belongs to.
    pub fn stage_height(&self) -> BlockHeight {
        self.stage_height
    }

    /// Append one artifact after FP16 admission.
    ///
    /// The artifact stays invisible to `root()`/`count()` until the next
    /// flush.
    pub fn add_with_node(&self, nonce: i32, vector: Vec<u8>, node_id: &str) -> Result<()> {
        validate_fp16_vector(&vector)?;

        let mut inner = self.inner.lock().expect("stage store poisoned");
        inner.pending.push(Artifact {
            nonce,
            vector,
            node_id: node_id.to_string(),
        });
        grid_telemetry::ARTIFACTS_APPENDED.inc();
        Ok(())
    }

    /// Publish all pending appends: extend the MMR and update the
    /// `(root, count, distribution)` snapshot in one step.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().expect("stage store poisoned");
        if inner.pending.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut inner.pending);
        let flushed = pending.len();
        for artifact in pending {
            inner.mmr.push(&artifact.leaf_data());
            *inner.per_node.entry(artifact.node_id.clone()).or_insert(0) += 1;
            inner.leaves.push(artifact);
        }
        inner.flushed_root = inner.mmr.root();
        debug!(
            stage = self.stage_height,
            flushed,
            count = inner.mmr.count(),
            "[ig-03] Store flushed"
        );
    }

    /// Root after the last flush.
    pub fn root(&self) -> Hash {
        self.inner.lock().expect("stage store poisoned").flushed_root
    }

    /// Leaf count after the last flush.
    pub fn count(&self) -> u32 {
        self.inner.lock().expect("stage store poisoned").mmr.count()
    }

    /// Atomic `(root, count, distribution)` snapshot of flushed state.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock().expect("stage store poisoned");
        StoreSnapshot {
            root: inner.flushed_root,
            count: inner.mmr.count(),
            distribution: inner
                .per_node
                .iter()
                .map(|(node, count)| (node.clone(), *count))
                .collect(),
        }
    }

    /// The flushed artifact at a leaf index together with its inclusion
    /// proof. Serves the participant proof endpoint.
    pub fn proof_for(&self, leaf_index: u32) -> Result<(Artifact, Vec<Hash>)> {
        let inner = self.inner.lock().expect("stage store poisoned");
        if leaf_index >= inner.mmr.count() {
            return Err(StoreError::LeafOutOfRange {
                index: leaf_index,
                count: inner.mmr.count(),
            });
        }
        let proof = inner.mmr.gen_proof(leaf_index)?;
        Ok((inner.leaves[leaf_index as usize].clone(), proof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmr::verify_proof;
    use shared_types::VECTOR_BYTES;

    fn vector(fill: u8) -> Vec<u8> {
        vec![fill & 0x3F; VECTOR_BYTES]
    }

    #[test]
    fn test_appends_invisible_until_flush() {
        let store = StageStore::new(100);
        store.add_with_node(1, vector(1), "node1").unwrap();
        store.add_with_node(2, vector(2), "node1").unwrap();

        assert_eq!(store.count(), 0);
        assert_eq!(store.root(), EMPTY_ROOT);

        store.flush();
        assert_eq!(store.count(), 2);
        assert_ne!(store.root(), EMPTY_ROOT);
    }

    #[test]
    fn test_flush_is_idempotent_on_unchanged_state() {
        let store = StageStore::new(100);
        store.add_with_node(1, vector(1), "node1").unwrap();
        store.flush();
        let snapshot = store.snapshot();

        store.flush();
        assert_eq!(store.snapshot(), snapshot);
    }

    #[test]
    fn test_per_node_distribution_is_sorted() {
        let store = StageStore::new(100);
        store.add_with_node(1, vector(1), "node2").unwrap();
        store.add_with_node(2, vector(2), "node1").unwrap();
        store.add_with_node(3, vector(3), "node2").unwrap();
        store.flush();

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.distribution,
            vec![("node1".to_string(), 1), ("node2".to_string(), 2)]
        );
    }

    #[test]
    fn test_invalid_vector_rejected_before_append() {
        let store = StageStore::new(100);
        let err = store.add_with_node(1, vec![0u8; 3], "node1").unwrap_err();
        assert!(matches!(err, StoreError::InvalidVectorData(_)));
        store.flush();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_served_proofs_verify_against_snapshot() {
        let store = StageStore::new(100);
        for i in 0..7 {
            store.add_with_node(i, vector(i as u8), "node1").unwrap();
        }
        store.flush();

        let snapshot = store.snapshot();
        let (artifact, proof) = store.proof_for(3).unwrap();
        assert!(verify_proof(
            &snapshot.root,
            snapshot.count,
            3,
            &artifact.leaf_data(),
            &proof
        ));
    }

    #[test]
    fn test_proofs_cover_only_flushed_leaves() {
        let store = StageStore::new(100);
        store.add_with_node(1, vector(1), "node1").unwrap();
        store.flush();
        store.add_with_node(2, vector(2), "node1").unwrap();

        assert!(store.proof_for(0).is_ok());
        assert!(matches!(
            store.proof_for(1),
            Err(StoreError::LeafOutOfRange { index: 1, count: 1 })
        ));
    }
}
