//! Error taxonomy for ML worker operations.
//!
//! The split matters downstream: the broker marks nodes FAILED and retries
//! on the next reconciliation for any failure, while the inference
//! dispatcher and the validator branch on transport vs. timeout vs.
//! application per their retry policies.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for ML worker operations.
pub type Result<T> = std::result::Result<T, MlClientError>;

/// Errors from remote operations against one ML worker.
#[derive(Debug, Error)]
pub enum MlClientError {
    /// The request exceeded its transport timeout. Explicit policy: no
    /// retry on timeouts.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Any other transport failure (connect refused, reset, DNS).
    #[error("transport error for {url}: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying error description.
        message: String,
    },

    /// The worker answered with a non-success status.
    #[error("application error from {url}: status {status}: {message}")]
    Application {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        message: String,
    },

    /// The worker answered 2xx with an undecodable body.
    #[error("invalid response payload from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decode error description.
        message: String,
    },
}

impl MlClientError {
    /// Whether the failure is a transport timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether a different node may succeed where this one failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the worker itself rejected the request.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = MlClientError::Timeout {
            url: "http://h:1/x".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_transport());

        let app = MlClientError::Application {
            url: "http://h:1/x".to_string(),
            status: 422,
            message: "bad model".to_string(),
        };
        assert!(app.is_application());
        assert!(!app.is_timeout());
    }
}
