//! # Commit Flow
//!
//! Worker callback → artifact store → commit worker → chain. The mock
//! chain records what would have been submitted; the phase tracker gates
//! both the callback and the commit window.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ig_01_ml_client::MockClientFactory;
    use ig_02_chain_bridge::{MockChainBridge, PhaseTracker};
    use ig_03_artifact_store::StoreRegistry;
    use ig_04_broker::{Broker, BrokerConfig, BrokerIdentity};
    use ig_05_commit_worker::{CommitConfig, CommitWorker};
    use ig_07_gateway::{build_router, AppState, DispatchConfig};
    use shared_types::{
        Artifact, BlockHeight, ChainParams, EpochPhase, PhaseSnapshot, VECTOR_BYTES,
    };
    use tower::util::ServiceExt;

    fn snapshot_in(phase: EpochPhase, stage: BlockHeight) -> PhaseSnapshot {
        PhaseSnapshot {
            block_height: stage + 5,
            block_hash: "HEAD".to_string(),
            epoch_index: 1,
            poc_start_block_height: stage,
            poc_start_block_hash: "SEED".to_string(),
            current_phase: phase,
            active_confirmation_event: None,
            is_synced: true,
            poc_v2_enabled: true,
            confirmation_poc_v2_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_generated_artifacts_end_up_committed() {
        let bridge = Arc::new(MockChainBridge::new());
        bridge.set_params(ChainParams::default());
        let tracker = Arc::new(PhaseTracker::new());
        tracker.update(snapshot_in(EpochPhase::PocGenerate, 100));
        let stores = Arc::new(StoreRegistry::new(tracker.clone()));

        let (broker, _join) = Broker::spawn(
            BrokerConfig::default(),
            BrokerIdentity::default(),
            Arc::new(MockClientFactory::new()),
            bridge.clone(),
            tracker.clone(),
        );
        let router = build_router(AppState::new(
            broker,
            stores.clone(),
            bridge.clone(),
            tracker.clone(),
            DispatchConfig::default(),
        ));

        // Two workers deliver artifact batches through the callback.
        for (node, nonces) in [("worker-a", 0..6), ("worker-b", 6..10)] {
            let batch = serde_json::json!({
                "poc_stage_start_block_height": 100,
                "artifacts": nonces
                    .map(|nonce| Artifact {
                        nonce,
                        vector: vec![0u8; VECTOR_BYTES],
                        node_id: node.to_string(),
                    })
                    .collect::<Vec<_>>(),
            });
            let response = router
                .clone()
                .oneshot(
                    axum::http::Request::post("/v2/poc-batches/generated")
                        .header("content-type", "application/json")
                        .body(axum::body::Body::from(serde_json::to_vec(&batch).unwrap()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), axum::http::StatusCode::OK);
        }

        // The commit worker flushes and publishes.
        let commit_worker = CommitWorker::new(
            bridge.clone(),
            stores.clone(),
            tracker.clone(),
            CommitConfig::default(),
        );
        commit_worker.tick().await;

        {
            let submissions = bridge.submissions();
            assert_eq!(submissions.store_commits.len(), 1);
            let commit = &submissions.store_commits[0];
            assert_eq!(commit.poc_stage_start_block_height, 100);
            assert_eq!(commit.count, 10);
            assert_eq!(
                commit.per_node_distribution,
                vec![("worker-a".to_string(), 6), ("worker-b".to_string(), 4)]
            );
        }

        // Entering validation publishes the scaled weight distribution.
        tracker.update(snapshot_in(EpochPhase::PocValidate, 100));
        commit_worker.tick().await;

        let submissions = bridge.submissions();
        assert_eq!(submissions.weight_distributions.len(), 1);
        let weights = &submissions.weight_distributions[0].weights;
        let total: u32 = weights.iter().map(|w| w.weight).sum();
        assert_eq!(total, 10);
    }
}
