//! # Grid Telemetry
//!
//! Logging and metrics for the Inference-Grid API node.
//!
//! ## Components
//!
//! - **Logging**: tracing-subscriber with an `EnvFilter`; per-subsystem
//!   log prefixes (`[ig-04]`, `[ig-06]`, ...) are applied at the call
//!   sites.
//! - **Metrics**: Prometheus counters/gauges in a process-global registry,
//!   exported by the gateway's `/metrics` route.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GRID_LOG_LEVEL` | `info` | Log level filter |
//! | `GRID_LOG_JSON` | unset | Any value switches to JSON log lines |

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, ARTIFACTS_APPENDED, ARTIFACTS_REJECTED,
    BROKER_COMMANDS_TOTAL, COMMITS_SUBMITTED, INFERENCE_LOCKS_IN_USE, NODES_REGISTERED,
    REGISTRY, VALIDATIONS_FAILED, VALIDATIONS_SUCCEEDED, WORKER_COMMANDS_FAILED,
    WORKER_COMMANDS_TOTAL,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global tracing subscriber was already installed.
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    /// Metric registration collided with an existing collector.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics in one call.
///
/// Idempotent metric registration; a second tracing init fails with
/// [`TelemetryError::TracingInit`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_tracing(config)?;
    register_metrics()?;
    Ok(())
}
