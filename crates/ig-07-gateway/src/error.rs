//! Gateway error taxonomy and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type alias for gateway handlers.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by gateway routes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The referenced stage or leaf does not exist here.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is outside its acceptance window.
    #[error("out of window: {0}")]
    OutOfWindow(String),

    /// The request body is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No eligible node could serve the request.
    #[error("no node available for model {0}")]
    NoNodeAvailable(String),

    /// The upstream node timed out (no retry by policy).
    #[error("upstream timeout")]
    UpstreamTimeout,

    /// Retries exhausted across the eligible fleet.
    #[error("all dispatch attempts failed")]
    AttemptsExhausted,

    /// Broker or chain plumbing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OutOfWindow(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoNodeAvailable(_) | Self::AttemptsExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
