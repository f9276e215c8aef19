//! # Phase-Edge Flow
//!
//! The chain follower turns mock chain heights into phase edges; the
//! broker event loop consumes them and the reconciler drives the mock ML
//! workers through the epoch: generate → validate → inference.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ig_01_ml_client::MockClientFactory;
    use ig_02_chain_bridge::{ChainFollower, FollowerConfig, MockChainBridge, PhaseTracker};
    use ig_04_broker::{Broker, BrokerConfig, BrokerEventLoop, BrokerIdentity, BrokerHandle};
    use shared_bus::InMemoryEventBus;
    use shared_types::{
        BlockInfo, ChainParams, HardwareStatus, MlNodeConfig, ModelSpec, NodeSnapshot,
        PocParams, PocStatus,
    };
    use tokio::sync::watch;

    async fn wait_for(
        broker: &BrokerHandle,
        predicate: impl Fn(&[NodeSnapshot]) -> bool,
    ) -> Vec<NodeSnapshot> {
        for _ in 0..300 {
            let nodes = broker.get_nodes().await.unwrap();
            if predicate(&nodes) {
                return nodes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fleet never reached the expected state");
    }

    #[tokio::test]
    async fn test_epoch_cycle_drives_the_fleet() {
        let bridge = Arc::new(MockChainBridge::new());
        bridge.set_params(ChainParams {
            poc: PocParams {
                model_id: "model1".to_string(),
                seq_len: 128,
                poc_v2_enabled: true,
                ..PocParams::default()
            },
            ..ChainParams::default()
        });
        bridge.set_governance_models(vec![shared_types::GovernanceModel {
            id: "model1".to_string(),
            args: vec![],
        }]);
        // Start inside the Inference tail of epoch 0 (offset 200 of 720).
        bridge.set_latest_block(BlockInfo {
            height: 200,
            hash: "H200".to_string(),
        });

        let tracker = Arc::new(PhaseTracker::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let factory = Arc::new(MockClientFactory::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let follower = ChainFollower::new(
            bridge.clone(),
            tracker.clone(),
            bus.clone(),
            FollowerConfig {
                poll_interval: Duration::from_millis(20),
                ..FollowerConfig::default()
            },
        );
        tokio::spawn(follower.run(shutdown_rx.clone()));

        let (broker, _join) = Broker::spawn(
            BrokerConfig::default(),
            BrokerIdentity {
                participant_address: "grid1self".to_string(),
                participant_pubkey_hex: "02ab".to_string(),
                callback_url: "http://localhost:9000".to_string(),
            },
            factory.clone(),
            bridge.clone(),
            tracker.clone(),
        );
        let event_loop = BrokerEventLoop::new(
            broker.clone(),
            bridge.clone(),
            bus.clone(),
            Duration::from_millis(50),
        );
        tokio::spawn(event_loop.run(shutdown_rx.clone()));

        broker
            .register_node(MlNodeConfig {
                id: "worker1".to_string(),
                host: "localhost".to_string(),
                inference_port: 8080,
                poc_port: 5000,
                inference_segment: String::new(),
                poc_segment: String::new(),
                max_concurrent: 2,
                models: vec![ModelSpec {
                    id: "model1".to_string(),
                    args: vec![],
                }],
                hardware: vec![],
            })
            .await
            .unwrap();

        // Inference phase: the node is driven to INFERENCE.
        wait_for(&broker, |nodes| {
            nodes[0].state.current_status == HardwareStatus::Inference
        })
        .await;

        // Next epoch begins: PoC generation starts.
        bridge.set_latest_block(BlockInfo {
            height: 725,
            hash: "H725".to_string(),
        });
        wait_for(&broker, |nodes| {
            nodes[0].state.current_status == HardwareStatus::Poc
                && nodes[0].state.current_poc_status == PocStatus::Generating
        })
        .await;
        let worker = factory.client_for("http://localhost:5000");
        assert!(worker.calls("init_generate_v2") >= 1);

        // Validation window: the node transitions locally.
        bridge.set_latest_block(BlockInfo {
            height: 815,
            hash: "H815".to_string(),
        });
        wait_for(&broker, |nodes| {
            nodes[0].state.current_poc_status == PocStatus::Validating
        })
        .await;

        // Back to inference for the epoch tail.
        bridge.set_latest_block(BlockInfo {
            height: 900,
            hash: "H900".to_string(),
        });
        wait_for(&broker, |nodes| {
            nodes[0].state.current_status == HardwareStatus::Inference
        })
        .await;

        // Locks are grantable again in the inference phase.
        let lease = broker
            .lock_available_node("model1", vec![])
            .await
            .unwrap()
            .expect("inference node should be lockable");
        assert_eq!(lease.node_id, "worker1");

        shutdown_tx.send(true).unwrap();
    }
}
