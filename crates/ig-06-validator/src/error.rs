//! Error taxonomy for validation.
//!
//! The permanent classes are sentinels: the worker pool branches on
//! [`ValidationError::is_permanent`] to decide between an invalidity
//! verdict and a retry.

use ig_03_artifact_store::Fp16Error;
use thiserror::Error;

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors raised while validating one participant or stage.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An inclusion proof did not verify against the committed root.
    #[error("proof verification failed for leaf {leaf_index}")]
    ProofVerificationFailed {
        /// Leaf the proof was claimed for.
        leaf_index: u32,
    },

    /// The response did not cover exactly the requested leaves.
    #[error("incomplete proof coverage: {0}")]
    IncompleteCoverage(String),

    /// A sampled vector failed FP16 admission.
    #[error("invalid vector data: {0}")]
    InvalidVectorData(#[from] Fp16Error),

    /// Two verified artifacts share a nonce.
    #[error("duplicate nonce {nonce} at leaves {first_leaf} and {second_leaf}")]
    DuplicateNonces {
        /// The repeated nonce.
        nonce: i32,
        /// First leaf carrying it.
        first_leaf: u32,
        /// Second leaf carrying it.
        second_leaf: u32,
    },

    /// Transport failure against the participant's API.
    #[error("participant request failed: {0}")]
    Transport(String),

    /// A local ML node refused or failed the forwarded work.
    #[error("ml node dispatch failed: {0}")]
    MlNode(String),

    /// Chain query or submission failure.
    #[error("chain error: {0}")]
    Chain(String),

    /// The whole stage cannot proceed (no fleet, no sampling hash).
    #[error("stage aborted: {0}")]
    Aborted(String),
}

impl ValidationError {
    /// Fraud/cryptographic classes: verdict −1, no more retries.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::ProofVerificationFailed { .. }
                | Self::IncompleteCoverage(_)
                | Self::InvalidVectorData(_)
                | Self::DuplicateNonces { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanence_classification() {
        assert!(ValidationError::IncompleteCoverage("expected 3 proofs, got 2".to_string())
            .is_permanent());
        assert!(ValidationError::ProofVerificationFailed { leaf_index: 4 }.is_permanent());
        assert!(ValidationError::DuplicateNonces {
            nonce: 9,
            first_leaf: 1,
            second_leaf: 5
        }
        .is_permanent());
        assert!(
            ValidationError::InvalidVectorData(Fp16Error::Infinity { offset: 0 }).is_permanent()
        );

        assert!(!ValidationError::Transport("reset".to_string()).is_permanent());
        assert!(!ValidationError::MlNode("busy".to_string()).is_permanent());
        assert!(!ValidationError::Chain("timeout".to_string()).is_permanent());
    }

    #[test]
    fn test_wrapped_fp16_preserves_source() {
        let err: ValidationError = Fp16Error::NaN {
            offset: 2,
            bits: 0x7E00,
        }
        .into();
        assert!(err.to_string().contains("NaN detected at byte offset 2"));
    }
}
