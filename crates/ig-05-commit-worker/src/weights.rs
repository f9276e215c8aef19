//! Exact-sum weight scaling.
//!
//! Scales a per-node artifact distribution to a target total. Each node
//! receives the floor of its proportional share; the remainder is handed
//! out one unit at a time in lexicographic node-id order, so the result
//! is deterministic and sums to the target exactly.

use shared_types::{NodeDistribution, WeightEntry};

use crate::error::{CommitError, Result};

/// Scale `distribution` so the weights sum to exactly `target_count`.
///
/// Preconditions: non-empty distribution, positive target, positive sum.
pub fn get_weight_distribution(
    distribution: &NodeDistribution,
    target_count: u32,
) -> Result<Vec<WeightEntry>> {
    if distribution.is_empty() {
        return Err(CommitError::EmptyDistribution);
    }
    if target_count == 0 {
        return Err(CommitError::ZeroTargetCount);
    }
    let sum: u64 = distribution.iter().map(|(_, count)| u64::from(*count)).sum();
    if sum == 0 {
        return Err(CommitError::ZeroDistributionSum);
    }

    let mut sorted: Vec<(&String, u32)> = distribution
        .iter()
        .map(|(node, count)| (node, *count))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let target = u64::from(target_count);
    let mut weights: Vec<WeightEntry> = sorted
        .iter()
        .map(|(node, count)| WeightEntry {
            node_id: (*node).clone(),
            weight: (u64::from(*count) * target / sum) as u32,
        })
        .collect();

    let assigned: u64 = weights.iter().map(|w| u64::from(w.weight)).sum();
    let mut residual = target - assigned;

    // Round-robin the residual units in id order until the sum is exact.
    let mut index = 0;
    let len = weights.len();
    while residual > 0 {
        weights[index % len].weight += 1;
        residual -= 1;
        index += 1;
    }

    Ok(weights)
}
