//! Error types for chain access.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, ChainBridgeError>;

/// Errors from chain queries and submissions.
#[derive(Debug, Error)]
pub enum ChainBridgeError {
    /// Transport-level failure reaching the chain daemon.
    #[error("chain transport error: {0}")]
    Transport(String),

    /// The chain daemon answered with an undecodable body.
    #[error("chain response decode error: {0}")]
    Decode(String),

    /// The queried entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The chain rejected a submission (out of window, deprecated route,
    /// bad signature). Never retried within the same stage.
    #[error("chain rejected submission: {0}")]
    Rejected(String),

    /// The signer is missing or unusable.
    #[error("signer error: {0}")]
    Signer(String),
}

impl ChainBridgeError {
    /// Whether a later identical call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ChainBridgeError::Transport("reset".to_string()).is_retryable());
        assert!(!ChainBridgeError::Rejected("out of window".to_string()).is_retryable());
        assert!(!ChainBridgeError::NotFound("participant".to_string()).is_retryable());
    }
}
