//! Error types for commit derivation.

use thiserror::Error;

/// Result type alias for commit operations.
pub type Result<T> = std::result::Result<T, CommitError>;

/// Errors from weight-distribution scaling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// No nodes in the distribution.
    #[error("empty distribution")]
    EmptyDistribution,

    /// The scaling target is zero.
    #[error("targetCount is 0")]
    ZeroTargetCount,

    /// All per-node counts are zero.
    #[error("distribution sum is 0")]
    ZeroDistributionSum,
}
