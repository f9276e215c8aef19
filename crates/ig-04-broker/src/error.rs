//! Error types for broker commands.

use thiserror::Error;

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced synchronously to broker command callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The node configuration failed validation.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// A uniqueness rule was violated.
    #[error("duplicate {what} conflicts with node {other_id}")]
    Duplicate {
        /// Which key collided: `id`, `inference endpoint`, `poc endpoint`.
        what: String,
        /// The already-registered node holding the key.
        other_id: String,
    },

    /// The fleet is at its configured size limit.
    #[error("node limit reached ({0})")]
    LimitReached(usize),

    /// No node with the given id is registered.
    #[error("unknown node {0}")]
    UnknownNode(String),

    /// The broker task is gone (shutdown).
    #[error("broker unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_mentions_duplicate() {
        let err = BrokerError::Duplicate {
            what: "inference endpoint".to_string(),
            other_id: "node1".to_string(),
        };
        assert!(err.to_string().contains("duplicate"));
        assert!(err.to_string().contains("node1"));
    }
}
