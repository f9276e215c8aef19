//! Deterministic validation-slot assignment.
//!
//! When the chain configures `validation_slots > 0`, each commit is
//! validated by a weighted subset of validators instead of all of them.
//! The assignment is a pure function of the frozen snapshot's app hash
//! and the committing participant, so every validator computes the same
//! subset without coordination.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use shared_types::ValidatorWeight;

/// Validators assigned to one participant's commit.
///
/// Draws `slots` weighted picks over the positive-weight validators
/// (duplicates collapse, so the result holds at most `slots` distinct
/// addresses). Zero- and negative-weight validators are never assigned.
pub fn assigned_validators(
    app_hash: &str,
    participant: &str,
    validator_weights: &[ValidatorWeight],
    slots: u32,
) -> Vec<String> {
    if slots == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&ValidatorWeight> = validator_weights
        .iter()
        .filter(|w| w.weight > 0)
        .collect();
    sorted.sort_by(|a, b| a.address.cmp(&b.address));

    let total_weight: i64 = sorted.iter().map(|w| w.weight).sum();
    if total_weight <= 0 {
        return Vec::new();
    }

    let mut hasher = Sha256::new();
    hasher.update(app_hash.as_bytes());
    hasher.update(participant.as_bytes());
    let digest = hasher.finalize();
    let seed = u64::from_be_bytes(digest[0..8].try_into().expect("8 bytes"));
    let mut rng = StdRng::seed_from_u64(seed);

    let mut assigned = Vec::new();
    for _ in 0..slots {
        let mut roll = rng.gen_range(0..total_weight);
        for validator in &sorted {
            if roll < validator.weight {
                if !assigned.contains(&validator.address) {
                    assigned.push(validator.address.clone());
                }
                break;
            }
            roll -= validator.weight;
        }
    }
    assigned
}

/// Whether `validator_address` is assigned to this commit.
pub fn is_assigned(
    app_hash: &str,
    participant: &str,
    validator_weights: &[ValidatorWeight],
    slots: u32,
    validator_address: &str,
) -> bool {
    assigned_validators(app_hash, participant, validator_weights, slots)
        .iter()
        .any(|a| a == validator_address)
}
