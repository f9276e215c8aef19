//! Prometheus metrics for Inference-Grid subsystems.
//!
//! All metrics follow the naming convention: `ig_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., commits_submitted_total)
//! - **Gauge**: Value that can go up or down (e.g., inference_locks_in_use)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BROKER METRICS (ig-04)
    // =========================================================================

    /// Broker commands processed, by command kind
    pub static ref BROKER_COMMANDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ig_broker_commands_total", "Broker commands processed"),
        &["command"]
    ).expect("metric creation failed");

    /// Registered nodes
    pub static ref NODES_REGISTERED: Gauge = Gauge::new(
        "ig_broker_nodes_registered",
        "Number of registered ML nodes"
    ).expect("metric creation failed");

    /// Outstanding inference locks across the fleet
    pub static ref INFERENCE_LOCKS_IN_USE: Gauge = Gauge::new(
        "ig_broker_inference_locks_in_use",
        "Outstanding inference locks across the fleet"
    ).expect("metric creation failed");

    /// Node worker commands executed
    pub static ref WORKER_COMMANDS_TOTAL: Counter = Counter::new(
        "ig_broker_worker_commands_total",
        "Node worker commands executed"
    ).expect("metric creation failed");

    /// Node worker commands that failed
    pub static ref WORKER_COMMANDS_FAILED: Counter = Counter::new(
        "ig_broker_worker_commands_failed_total",
        "Node worker commands that ended in failure"
    ).expect("metric creation failed");

    // =========================================================================
    // ARTIFACT STORE METRICS (ig-03)
    // =========================================================================

    /// Artifacts appended across all stages
    pub static ref ARTIFACTS_APPENDED: Counter = Counter::new(
        "ig_store_artifacts_appended_total",
        "Artifacts appended across all stage stores"
    ).expect("metric creation failed");

    /// Artifacts rejected on admission (bad vector data or out of window)
    pub static ref ARTIFACTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("ig_store_artifacts_rejected_total", "Artifacts rejected on admission"),
        &["reason"]
    ).expect("metric creation failed");

    // =========================================================================
    // COMMIT WORKER METRICS (ig-05)
    // =========================================================================

    /// Store commits submitted to the chain
    pub static ref COMMITS_SUBMITTED: Counter = Counter::new(
        "ig_commit_store_commits_submitted_total",
        "Store commits submitted to the chain"
    ).expect("metric creation failed");

    // =========================================================================
    // VALIDATOR METRICS (ig-06)
    // =========================================================================

    /// Participants validated successfully, per stage variant
    pub static ref VALIDATIONS_SUCCEEDED: CounterVec = CounterVec::new(
        Opts::new("ig_validator_participants_succeeded_total", "Participants validated successfully"),
        &["variant"]  // variant: v1/v2
    ).expect("metric creation failed");

    /// Participants that failed validation (permanent or retries exhausted)
    pub static ref VALIDATIONS_FAILED: CounterVec = CounterVec::new(
        Opts::new("ig_validator_participants_failed_total", "Participants that failed validation"),
        &["variant"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; duplicate registration is reported as
/// [`TelemetryError::MetricsInit`] only for genuinely conflicting
/// collectors.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BROKER_COMMANDS_TOTAL.clone()),
        Box::new(NODES_REGISTERED.clone()),
        Box::new(INFERENCE_LOCKS_IN_USE.clone()),
        Box::new(WORKER_COMMANDS_TOTAL.clone()),
        Box::new(WORKER_COMMANDS_FAILED.clone()),
        Box::new(ARTIFACTS_APPENDED.clone()),
        Box::new(ARTIFACTS_REJECTED.clone()),
        Box::new(COMMITS_SUBMITTED.clone()),
        Box::new(VALIDATIONS_SUCCEEDED.clone()),
        Box::new(VALIDATIONS_FAILED.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) => {}
            // Re-registering the same collector is fine (repeated init).
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
