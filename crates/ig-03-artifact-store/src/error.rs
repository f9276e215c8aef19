//! Error types for the artifact store.

use shared_types::BlockHeight;
use thiserror::Error;

use crate::fp16::Fp16Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from stage store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The artifact vector failed FP16 admission. Wrapped so callers can
    /// classify it as permanent with a structural match.
    #[error("invalid vector data: {0}")]
    InvalidVectorData(#[from] Fp16Error),

    /// The phase gate rejected the append: the matching stage is not
    /// generating right now.
    #[error("stage {stage} is not accepting artifacts at height {height}")]
    OutOfWindow {
        /// Stage the append was addressed to.
        stage: BlockHeight,
        /// Observed chain height at rejection time.
        height: BlockHeight,
    },

    /// No store is retained for the stage.
    #[error("unknown stage {0}")]
    UnknownStage(BlockHeight),

    /// A proof was requested for a leaf beyond the committed count.
    #[error("leaf index {index} out of range (count {count})")]
    LeafOutOfRange {
        /// Requested leaf index.
        index: u32,
        /// Committed leaf count.
        count: u32,
    },
}

impl StoreError {
    /// Whether the error marks the input permanently unacceptable
    /// (as opposed to merely mistimed).
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidVectorData(_) | Self::LeafOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_fp16_error_is_matchable() {
        let err: StoreError = Fp16Error::Infinity { offset: 4 }.into();
        assert!(matches!(err, StoreError::InvalidVectorData(_)));
        assert!(err.is_permanent());
        assert!(err.to_string().starts_with("invalid vector data:"));
    }

    #[test]
    fn test_out_of_window_is_not_permanent() {
        let err = StoreError::OutOfWindow {
            stage: 100,
            height: 300,
        };
        assert!(!err.is_permanent());
    }
}
