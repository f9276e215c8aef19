//! Local fleet selection for validation duty.

use std::time::Duration;

use ig_04_broker::BrokerHandle;
use shared_types::{HardwareStatus, NodeSnapshot};
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};

/// Nodes usable for validation work this stage.
///
/// Accepts POC in any sub-status and INFERENCE; rejects FAILED, UNKNOWN,
/// TRAINING and STOPPED nodes, administratively disabled nodes, and nodes
/// reserved for inference continuity.
pub fn filter_for_validation(nodes: &[NodeSnapshot]) -> Vec<NodeSnapshot> {
    nodes
        .iter()
        .filter(|snapshot| {
            if !snapshot.node.admin.enabled {
                return false;
            }
            if snapshot.state.should_continue_inference {
                return false;
            }
            matches!(
                snapshot.state.current_status,
                HardwareStatus::Poc | HardwareStatus::Inference
            )
        })
        .cloned()
        .collect()
}

/// Fetch the fleet snapshot until it yields usable validation nodes.
///
/// Retries `attempts` times spaced by `delay`; aborts the stage when the
/// filtered set stays empty.
pub async fn get_nodes_with_retry(
    broker: &BrokerHandle,
    attempts: u32,
    delay: Duration,
) -> Result<Vec<NodeSnapshot>> {
    for attempt in 1..=attempts {
        match broker.get_nodes().await {
            Ok(nodes) => {
                let usable = filter_for_validation(&nodes);
                if !usable.is_empty() {
                    return Ok(usable);
                }
                debug!(attempt, "[ig-06] No usable validation nodes yet");
            }
            Err(e) => warn!(attempt, "[ig-06] Fleet snapshot failed: {e}"),
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Err(ValidationError::Aborted(
        "no usable ML nodes for validation".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{
        AdminState, MlNode, MlNodeConfig, ModelSpec, NodeState, PocStatus,
    };

    fn snapshot(id: &str, status: HardwareStatus) -> NodeSnapshot {
        NodeSnapshot {
            node: MlNode {
                config: MlNodeConfig {
                    id: id.to_string(),
                    host: "h".to_string(),
                    inference_port: 8080,
                    poc_port: 5000,
                    inference_segment: String::new(),
                    poc_segment: String::new(),
                    max_concurrent: 1,
                    models: vec![ModelSpec {
                        id: "m".to_string(),
                        args: vec![],
                    }],
                    hardware: vec![],
                },
                node_num: 1,
                admin: AdminState {
                    enabled: true,
                    effective_epoch: 0,
                },
            },
            state: NodeState {
                current_status: status,
                current_poc_status: PocStatus::Idle,
                ..NodeState::default()
            },
            locks_in_use: 0,
        }
    }

    #[test]
    fn test_filter_accepts_poc_and_inference_only() {
        let nodes = vec![
            snapshot("poc", HardwareStatus::Poc),
            snapshot("inference", HardwareStatus::Inference),
            snapshot("failed", HardwareStatus::Failed),
            snapshot("unknown", HardwareStatus::Unknown),
            snapshot("stopped", HardwareStatus::Stopped),
            snapshot("training", HardwareStatus::Training),
        ];
        let usable = filter_for_validation(&nodes);
        let ids: Vec<&str> = usable.iter().map(|n| n.node.config.id.as_str()).collect();
        assert_eq!(ids, vec!["poc", "inference"]);
    }

    #[test]
    fn test_filter_rejects_disabled_and_reserved() {
        let mut disabled = snapshot("disabled", HardwareStatus::Poc);
        disabled.node.admin.enabled = false;

        let mut reserved = snapshot("reserved", HardwareStatus::Inference);
        reserved.state.should_continue_inference = true;

        assert!(filter_for_validation(&[disabled, reserved]).is_empty());
    }
}
