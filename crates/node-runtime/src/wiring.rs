//! Phased subsystem wiring.
//!
//! ## Phase 1 (chain plumbing):
//! - Signer, ChainBridge, PhaseTracker, shared bus, chain follower
//!
//! ## Phase 2 (fleet):
//! - Artifact store registry, broker + event loop, startup registrations
//!
//! ## Phase 3 (chain-time consumers):
//! - Commit worker, validator orchestrator
//!
//! ## Phase 4 (surface):
//! - Gateway listener, ctrl-c shutdown fan-out

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ig_01_ml_client::HttpClientFactory;
use ig_02_chain_bridge::{
    ChainFollower, FollowerConfig, HttpChainBridge, PhaseTracker, Secp256k1Signer, Signer,
};
use ig_03_artifact_store::StoreRegistry;
use ig_04_broker::{Broker, BrokerConfig, BrokerEventLoop, BrokerIdentity};
use ig_05_commit_worker::{CommitConfig, CommitWorker};
use ig_06_validator::{
    HttpProofFetcher, OffChainConfig, OffChainValidator, OnChainConfig, OnChainValidator,
    Orchestrator,
};
use ig_07_gateway::{build_router, AppState, DispatchConfig};
use shared_bus::InMemoryEventBus;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::NodeConfig;

/// Bring the node up and run until ctrl-c.
pub async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // ---------------------------------------------------------------------
    // Phase 1: chain plumbing
    // ---------------------------------------------------------------------
    info!("Phase 1: Initializing chain bridge and follower (ig-02)");
    let secret_hex = NodeConfig::account_secret_hex()?;
    let signer: Arc<dyn Signer> = Arc::new(
        Secp256k1Signer::from_hex(&secret_hex, config.chain.account_address.clone())
            .context("loading account key")?,
    );
    let bridge = Arc::new(HttpChainBridge::new(&config.chain.base_url, signer.clone()));
    let tracker = Arc::new(PhaseTracker::new());
    let bus = Arc::new(InMemoryEventBus::new());

    let follower = ChainFollower::new(
        bridge.clone(),
        tracker.clone(),
        bus.clone(),
        FollowerConfig {
            poll_interval: Duration::from_millis(config.chain.poll_interval_ms),
            ..FollowerConfig::default()
        },
    );
    tasks.push(tokio::spawn(follower.run(shutdown_rx.clone())));

    // ---------------------------------------------------------------------
    // Phase 2: fleet
    // ---------------------------------------------------------------------
    info!("Phase 2: Initializing artifact store (ig-03) and broker (ig-04)");
    let stores = Arc::new(StoreRegistry::new(tracker.clone()));
    let factory = Arc::new(HttpClientFactory::new());

    let mut broker_config = BrokerConfig::default();
    if config.broker.max_nodes > 0 {
        broker_config.max_nodes = config.broker.max_nodes;
    }
    let identity = BrokerIdentity {
        participant_address: config.chain.account_address.clone(),
        participant_pubkey_hex: signer.pubkey_hex(),
        callback_url: config.gateway.public_url.clone(),
    };
    let (broker, broker_join) = Broker::spawn(
        broker_config,
        identity,
        factory.clone(),
        bridge.clone(),
        tracker.clone(),
    );

    for node in &config.nodes {
        match broker.register_node(node.clone()).await {
            Ok(registered) => {
                info!(id = %registered.config.id, num = registered.node_num, "Startup node registered")
            }
            Err(e) => warn!(id = %node.id, "Startup registration failed: {e}"),
        }
    }

    let probe_interval = if config.broker.probe_interval_secs > 0 {
        Duration::from_secs(config.broker.probe_interval_secs)
    } else {
        ig_04_broker::trigger::DEFAULT_PROBE_INTERVAL
    };
    let event_loop = BrokerEventLoop::new(
        broker.clone(),
        bridge.clone(),
        bus.clone(),
        probe_interval,
    );
    tasks.push(tokio::spawn(event_loop.run(shutdown_rx.clone())));

    // ---------------------------------------------------------------------
    // Phase 3: chain-time consumers
    // ---------------------------------------------------------------------
    info!("Phase 3: Initializing commit worker (ig-05) and validator (ig-06)");
    let commit_worker = CommitWorker::new(
        bridge.clone(),
        stores.clone(),
        tracker.clone(),
        CommitConfig::default(),
    );
    tasks.push(tokio::spawn(commit_worker.run(shutdown_rx.clone())));

    let mut offchain_config = OffChainConfig {
        callback_url: config.gateway.public_url.clone(),
        ..OffChainConfig::default()
    };
    if config.validator.worker_count > 0 {
        offchain_config.worker_count = config.validator.worker_count;
    }
    if config.validator.max_retries > 0 {
        offchain_config.max_retries = config.validator.max_retries;
    }
    let proofs = Arc::new(HttpProofFetcher::new(signer.clone()));
    let offchain = Arc::new(OffChainValidator::new(
        bridge.clone(),
        broker.clone(),
        tracker.clone(),
        proofs,
        factory.clone(),
        signer.clone(),
        offchain_config,
    ));
    let onchain = Arc::new(OnChainValidator::new(
        bridge.clone(),
        broker.clone(),
        tracker.clone(),
        factory.clone(),
        signer.clone(),
        OnChainConfig::default(),
    ));
    let orchestrator = Orchestrator::new(bus.clone(), offchain, onchain);
    tasks.push(tokio::spawn(orchestrator.run(shutdown_rx.clone())));

    // ---------------------------------------------------------------------
    // Phase 4: surface
    // ---------------------------------------------------------------------
    info!("Phase 4: Starting gateway (ig-07) on {}", config.gateway.listen_addr);
    let state = AppState::new(
        broker.clone(),
        stores,
        bridge,
        tracker,
        DispatchConfig::default(),
    );
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.gateway.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.gateway.listen_addr))?;
    let mut gateway_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = gateway_shutdown.changed().await;
        });
        if let Err(e) = serve.await {
            warn!("Gateway server error: {e}");
        }
    }));

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down gracefully...");

    let _ = shutdown_tx.send(true);
    let _ = broker.shutdown().await;
    for task in tasks {
        let _ = task.await;
    }
    let _ = broker_join.await;

    info!("Shutdown complete");
    Ok(())
}
