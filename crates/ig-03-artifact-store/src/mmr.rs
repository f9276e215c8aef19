//! Merkle Mountain Range accumulator.
//!
//! Append-only: every leaf append either starts a new mountain or merges
//! completed mountains of equal height. The committed root is the "bagged"
//! fold of all peak hashes, right to left. Proofs carry the climb siblings
//! inside the leaf's mountain followed by the remaining peaks left to
//! right; verification reconstructs the mountain structure purely from
//! `(count, leaf_index)`, so a proof is only valid against the exact
//! committed `(root, count)` pair.
//!
//! Hashing is SHA-256 with domain separation: `H(0x00 || leaf)` for
//! leaves, `H(0x01 || left || right)` for interior nodes.

use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

/// Node hash.
pub type Hash = [u8; 32];

/// Root of an empty accumulator.
pub const EMPTY_ROOT: Hash = [0u8; 32];

fn hash_leaf(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(data);
    hasher.finalize().into()
}

fn hash_node(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn all_ones(n: u64) -> bool {
    n != 0 && n.count_zeros() == n.leading_zeros()
}

fn jump_left(pos: u64) -> u64 {
    let bit_length = 64 - pos.leading_zeros();
    let most_significant = 1u64 << (bit_length - 1);
    pos - (most_significant - 1)
}

/// Height of a 0-based MMR position.
fn pos_height(pos: u64) -> u32 {
    let mut pos = pos + 1;
    while !all_ones(pos) {
        pos = jump_left(pos);
    }
    64 - pos.leading_zeros() - 1
}

/// MMR position of the n-th leaf (0-based).
fn leaf_pos(leaf_index: u64) -> u64 {
    2 * leaf_index - u64::from(leaf_index.count_ones())
}

/// Node count of an MMR holding `leaf_count` leaves.
fn mmr_size_for(leaf_count: u64) -> u64 {
    if leaf_count == 0 {
        0
    } else {
        2 * leaf_count - u64::from(leaf_count.count_ones())
    }
}

/// Distance to the same-height sibling.
fn sibling_offset(height: u32) -> u64 {
    (2u64 << height) - 1
}

/// Peak positions of an MMR of the given size, left to right.
fn peak_positions(mmr_size: u64) -> Vec<u64> {
    let mut peaks = Vec::new();
    let mut left = mmr_size;
    let mut offset = 0u64;
    while left > 0 {
        let bit_length = 64 - left.leading_zeros();
        let mut tree_size = (1u64 << bit_length) - 1;
        if tree_size > left {
            tree_size = (1u64 << (bit_length - 1)) - 1;
        }
        peaks.push(offset + tree_size - 1);
        offset += tree_size;
        left -= tree_size;
    }
    peaks
}

/// Fold peaks right to left into the committed root.
fn bag_peaks(peaks: &[Hash]) -> Hash {
    match peaks.split_last() {
        None => EMPTY_ROOT,
        Some((last, rest)) => rest
            .iter()
            .rev()
            .fold(*last, |acc, peak| hash_node(peak, &acc)),
    }
}

/// In-memory Merkle Mountain Range.
#[derive(Debug, Clone, Default)]
pub struct Mmr {
    nodes: Vec<Hash>,
    leaf_count: u32,
}

impl Mmr {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appended leaves.
    pub fn count(&self) -> u32 {
        self.leaf_count
    }

    /// Current root over all appended leaves.
    pub fn root(&self) -> Hash {
        let peaks: Vec<Hash> = peak_positions(self.nodes.len() as u64)
            .into_iter()
            .map(|p| self.nodes[p as usize])
            .collect();
        bag_peaks(&peaks)
    }

    /// Append one leaf; returns its leaf index.
    pub fn push(&mut self, leaf_data: &[u8]) -> u32 {
        let leaf_index = self.leaf_count;
        let mut pos = self.nodes.len() as u64;
        self.nodes.push(hash_leaf(leaf_data));

        let mut height = 0u32;
        while pos_height(pos + 1) > height {
            let left_pos = pos - sibling_offset(height);
            let parent = hash_node(&self.nodes[left_pos as usize], &self.nodes[pos as usize]);
            self.nodes.push(parent);
            pos = self.nodes.len() as u64 - 1;
            height += 1;
        }

        self.leaf_count += 1;
        leaf_index
    }

    /// Inclusion proof for one leaf: climb siblings, then other peaks.
    pub fn gen_proof(&self, leaf_index: u32) -> Result<Vec<Hash>> {
        if leaf_index >= self.leaf_count {
            return Err(StoreError::LeafOutOfRange {
                index: leaf_index,
                count: self.leaf_count,
            });
        }

        let peaks = peak_positions(self.nodes.len() as u64);
        let mut pos = leaf_pos(u64::from(leaf_index));
        let mut height = 0u32;
        let mut proof = Vec::new();

        while !peaks.contains(&pos) {
            if pos_height(pos + 1) > height {
                // pos is a right child; sibling is to the left.
                proof.push(self.nodes[(pos - sibling_offset(height)) as usize]);
                pos += 1;
            } else {
                proof.push(self.nodes[(pos + sibling_offset(height)) as usize]);
                pos += sibling_offset(height) + 1;
            }
            height += 1;
        }

        let our_peak = pos;
        for &peak in &peaks {
            if peak != our_peak {
                proof.push(self.nodes[peak as usize]);
            }
        }
        Ok(proof)
    }
}

/// Verify an inclusion proof against a committed `(root, count)` pair.
///
/// `leaf_data` is the raw leaf encoding (`nonce LE32 || vector`); the
/// structure of the climb is derived entirely from `count` and
/// `leaf_index`, so proofs cannot be replayed across commits of different
/// shapes. Trailing or missing proof hashes fail verification.
pub fn verify_proof(
    root: &Hash,
    count: u32,
    leaf_index: u32,
    leaf_data: &[u8],
    proof: &[Hash],
) -> bool {
    if count == 0 || leaf_index >= count {
        return false;
    }

    let mmr_size = mmr_size_for(u64::from(count));
    let peaks = peak_positions(mmr_size);
    let mut pos = leaf_pos(u64::from(leaf_index));
    let mut height = 0u32;
    let mut hash = hash_leaf(leaf_data);
    let mut hashes = proof.iter();

    while !peaks.contains(&pos) {
        let Some(sibling) = hashes.next() else {
            return false;
        };
        if pos_height(pos + 1) > height {
            hash = hash_node(sibling, &hash);
            pos += 1;
        } else {
            hash = hash_node(&hash, sibling);
            pos += sibling_offset(height) + 1;
        }
        height += 1;
    }

    let Some(our_peak_index) = peaks.iter().position(|&p| p == pos) else {
        return false;
    };

    let mut peak_hashes = Vec::with_capacity(peaks.len());
    for i in 0..peaks.len() {
        if i == our_peak_index {
            peak_hashes.push(hash);
        } else {
            let Some(peak) = hashes.next() else {
                return false;
            };
            peak_hashes.push(*peak);
        }
    }

    if hashes.next().is_some() {
        return false;
    }

    bag_peaks(&peak_hashes) == *root
}
