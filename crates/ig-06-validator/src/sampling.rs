//! Deterministic leaf sampling.
//!
//! The sample is a function of `(validator pubkey, sampling block hash,
//! stage height)` so each validator draws its own reproducible subset and
//! participants cannot precompute it before the sampling hash exists.
//!
//! Committed counts can exceed 100M leaves, so the Fisher–Yates shuffle
//! is lazy: only touched positions live in a sparse swap map; memory is
//! O(sample_size), not O(count).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use shared_types::BlockHeight;

/// Draw `sample_size` distinct leaf indices in `[0, count)`.
///
/// Returns `min(sample_size, count)` indices; deterministic in all
/// arguments.
pub fn sample_leaf_indices(
    validator_pubkey: &str,
    sampling_block_hash: &str,
    stage_height: BlockHeight,
    count: u32,
    sample_size: u32,
) -> Vec<u32> {
    let take = sample_size.min(count);
    if take == 0 {
        return Vec::new();
    }

    let mut hasher = Sha256::new();
    hasher.update(validator_pubkey.as_bytes());
    hasher.update(b":");
    hasher.update(sampling_block_hash.as_bytes());
    hasher.update(b":");
    hasher.update(stage_height.to_string().as_bytes());
    let digest = hasher.finalize();
    let seed = u64::from_be_bytes(digest[0..8].try_into().expect("8 bytes"));

    let mut rng = StdRng::seed_from_u64(seed);
    let mut swaps: HashMap<u32, u32> = HashMap::new();
    let mut indices = Vec::with_capacity(take as usize);

    for i in 0..take {
        let j = rng.gen_range(i..count);
        let value_at_j = swaps.get(&j).copied().unwrap_or(j);
        let value_at_i = swaps.get(&i).copied().unwrap_or(i);
        indices.push(value_at_j);
        swaps.insert(j, value_at_i);
    }
    indices
}
