//! # V2 Proof Exchange Flow
//!
//! One node plays the participant: its gateway serves MMR proofs from a
//! real stage store over real HTTP. Another node plays the validator:
//! its proof fetcher signs a request, fetches, and verifies against the
//! committed `(root, count)`. No mocks on the wire path; only the chain
//! and ML workers are mocked.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ig_01_ml_client::MockClientFactory;
    use ig_02_chain_bridge::{MockChainBridge, PhaseTracker, Secp256k1Signer, Signer};
    use ig_03_artifact_store::StoreRegistry;
    use ig_04_broker::{Broker, BrokerConfig, BrokerIdentity};
    use ig_06_validator::{
        sample_leaf_indices, HttpProofFetcher, ProofProvider, ProofQuery, ValidationError,
    };
    use ig_07_gateway::{build_router, AppState, DispatchConfig};
    use shared_types::{
        BlockHeight, EpochPhase, PhaseSnapshot, VECTOR_BYTES,
    };

    fn snapshot_in(phase: EpochPhase, stage: BlockHeight) -> PhaseSnapshot {
        PhaseSnapshot {
            block_height: stage + 5,
            block_hash: "SAMPLING-HASH".to_string(),
            epoch_index: 4,
            poc_start_block_height: stage,
            poc_start_block_hash: "SEED".to_string(),
            current_phase: phase,
            active_confirmation_event: None,
            is_synced: true,
            poc_v2_enabled: true,
            confirmation_poc_v2_enabled: false,
        }
    }

    /// Spin a participant gateway around a filled stage store; returns
    /// its base URL and the committed `(root, count)`.
    async fn spawn_participant(stage: BlockHeight, leaves: u32) -> (String, Vec<u8>, u32) {
        let tracker = Arc::new(PhaseTracker::new());
        tracker.update(snapshot_in(EpochPhase::PocGenerate, stage));
        let stores = Arc::new(StoreRegistry::new(tracker.clone()));
        let bridge = Arc::new(MockChainBridge::new());

        let store = stores.get_or_create(stage);
        for nonce in 0..leaves as i32 {
            store
                .add_with_node(nonce, vec![(nonce % 60) as u8; VECTOR_BYTES], "worker-a")
                .unwrap();
        }
        store.flush();
        let committed = store.snapshot();

        let (broker, _join) = Broker::spawn(
            BrokerConfig::default(),
            BrokerIdentity::default(),
            Arc::new(MockClientFactory::new()),
            bridge.clone(),
            tracker.clone(),
        );
        let state = AppState::new(broker, stores, bridge, tracker, DispatchConfig::default());
        let router = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (
            format!("http://127.0.0.1:{port}"),
            committed.root.to_vec(),
            committed.count,
        )
    }

    #[tokio::test]
    async fn test_fetch_and_verify_against_live_participant() {
        let stage = 100;
        let (url, root, count) = spawn_participant(stage, 64).await;

        let validator_signer =
            Arc::new(Secp256k1Signer::new(&[11u8; 32], "grid1validator".to_string()).unwrap());
        let fetcher = HttpProofFetcher::new(validator_signer.clone());

        let leaf_indices = sample_leaf_indices(
            &validator_signer.pubkey_hex(),
            "SAMPLING-HASH",
            stage,
            count,
            12,
        );
        let query = ProofQuery {
            stage_height: stage,
            root_hash: root,
            count,
            leaf_indices: leaf_indices.clone(),
            participant_address: "grid1participant".to_string(),
        };

        let artifacts = fetcher.fetch_and_verify(&url, &query).await.unwrap();
        assert_eq!(artifacts.len(), leaf_indices.len());

        // Artifacts come back matched to the requested leaves with the
        // participant's real nonces.
        for artifact in &artifacts {
            assert!(leaf_indices.contains(&artifact.leaf_index));
            assert_eq!(artifact.nonce, artifact.leaf_index as i32);
            assert_eq!(artifact.vector.len(), VECTOR_BYTES);
        }
    }

    #[tokio::test]
    async fn test_wrong_root_is_refused_by_participant() {
        let stage = 100;
        let (url, _root, count) = spawn_participant(stage, 32).await;

        let validator_signer =
            Arc::new(Secp256k1Signer::new(&[11u8; 32], "grid1validator".to_string()).unwrap());
        let fetcher = HttpProofFetcher::new(validator_signer);

        // A fabricated root: the participant's store never committed it,
        // so the gateway answers 409 and the fetch fails as transport.
        let query = ProofQuery {
            stage_height: stage,
            root_hash: vec![0xAB; 32],
            count,
            leaf_indices: vec![0, 1, 2],
            participant_address: "grid1participant".to_string(),
        };
        let err = fetcher.fetch_and_verify(&url, &query).await.unwrap_err();
        assert!(matches!(err, ValidationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unknown_stage_is_refused() {
        let (url, root, count) = spawn_participant(100, 8).await;

        let validator_signer =
            Arc::new(Secp256k1Signer::new(&[11u8; 32], "grid1validator".to_string()).unwrap());
        let fetcher = HttpProofFetcher::new(validator_signer);

        let query = ProofQuery {
            stage_height: 900,
            root_hash: root,
            count,
            leaf_indices: vec![0],
            participant_address: "grid1participant".to_string(),
        };
        let err = fetcher.fetch_and_verify(&url, &query).await.unwrap_err();
        assert!(matches!(err, ValidationError::Transport(_)));
    }
}
