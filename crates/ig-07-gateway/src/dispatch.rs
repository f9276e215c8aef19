//! Inference dispatch: lock, forward, release, retry.
//!
//! Policy per failure class:
//!
//! | Failure | Retry? | Fleet recheck? |
//! |---------|--------|----------------|
//! | transport timeout | no | yes |
//! | other transport error | yes, different node | yes |
//! | HTTP 5xx | yes, different node | yes |
//! | HTTP 4xx / other | no | no |
//! | 2xx | n/a | n/a |
//!
//! Every acquired lock is released exactly once, immediately after the
//! upstream call, with `Success` for 2xx and `Error` otherwise. Retries
//! re-enter the broker with the accumulated skip set.

use std::time::Duration;

use ig_04_broker::{BrokerHandle, LockOutcome};
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Dispatch tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum lock-and-forward attempts.
    pub max_attempts: u32,
    /// Upstream transport timeout.
    pub request_timeout: Duration,
    /// Path appended to the node's inference URL.
    pub upstream_path: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(30),
            upstream_path: "/v1/chat/completions".to_string(),
        }
    }
}

/// A completed dispatch: upstream status and body, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Upstream HTTP status.
    pub status: u16,
    /// Upstream response body.
    pub body: Vec<u8>,
}

/// Serve one inference request against the fleet.
pub async fn dispatch_inference(
    broker: &BrokerHandle,
    http: &reqwest::Client,
    config: &DispatchConfig,
    model: &str,
    body: Vec<u8>,
) -> Result<DispatchOutcome> {
    let mut skip_ids: Vec<String> = Vec::new();

    for attempt in 1..=config.max_attempts {
        let lease = broker
            .lock_available_node(model, skip_ids.clone())
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let Some(lease) = lease else {
            return Err(GatewayError::NoNodeAvailable(model.to_string()));
        };

        let url = format!(
            "{}{}",
            lease.inference_url.trim_end_matches('/'),
            config.upstream_path
        );
        debug!(attempt, node = %lease.node_id, %url, "[ig-07] Dispatching inference");

        let response = http
            .post(&url)
            .timeout(config.request_timeout)
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await;

        match response {
            Err(e) if e.is_timeout() => {
                release(broker, &lease.node_id, LockOutcome::Error {
                    message: format!("timeout: {e}"),
                })
                .await;
                // Timeouts are not retried; the fleet gets rechecked.
                let _ = broker.trigger_status_query(false).await;
                return Err(GatewayError::UpstreamTimeout);
            }
            Err(e) => {
                warn!(node = %lease.node_id, "[ig-07] Transport failure: {e}");
                release(broker, &lease.node_id, LockOutcome::Error {
                    message: e.to_string(),
                })
                .await;
                skip_ids.push(lease.node_id.clone());
                let _ = broker.trigger_status_query(false).await;
                continue;
            }
            Ok(response) => {
                let status = response.status();
                let bytes = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

                if status.is_success() {
                    release(broker, &lease.node_id, LockOutcome::Success).await;
                    return Ok(DispatchOutcome {
                        status: status.as_u16(),
                        body: bytes,
                    });
                }

                release(broker, &lease.node_id, LockOutcome::Error {
                    message: format!("upstream status {status}"),
                })
                .await;

                if status.is_server_error() {
                    warn!(node = %lease.node_id, %status, "[ig-07] Upstream 5xx; retrying");
                    skip_ids.push(lease.node_id.clone());
                    let _ = broker.trigger_status_query(false).await;
                    continue;
                }

                // 4xx and other non-success: the application said no.
                // Surface it verbatim, no retry, no recheck.
                return Ok(DispatchOutcome {
                    status: status.as_u16(),
                    body: bytes,
                });
            }
        }
    }

    Err(GatewayError::AttemptsExhausted)
}

async fn release(broker: &BrokerHandle, node_id: &str, outcome: LockOutcome) {
    if let Err(e) = broker.release_node(node_id, outcome).await {
        warn!(node_id, "[ig-07] Lock release failed: {e}");
    }
}
