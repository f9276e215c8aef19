//! Router assembly and shared state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ig_02_chain_bridge::{ChainBridge, PhaseTracker};
use ig_03_artifact_store::StoreRegistry;
use ig_04_broker::BrokerHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::DispatchConfig;
use crate::handlers;

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    /// Fleet commands and snapshots.
    pub broker: BrokerHandle,
    /// Stage stores (proof serving, artifact appends).
    pub stores: Arc<StoreRegistry>,
    /// Chain submissions (validation verdicts).
    pub bridge: Arc<dyn ChainBridge>,
    /// Phase gating.
    pub tracker: Arc<PhaseTracker>,
    /// Upstream inference client.
    pub http: reqwest::Client,
    /// Dispatch policy.
    pub dispatch: DispatchConfig,
}

impl AppState {
    /// Assemble state with a fresh reqwest pool.
    pub fn new(
        broker: BrokerHandle,
        stores: Arc<StoreRegistry>,
        bridge: Arc<dyn ChainBridge>,
        tracker: Arc<PhaseTracker>,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            broker,
            stores,
            bridge,
            tracker,
            http: reqwest::Client::new(),
            dispatch,
        }
    }
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::nodes::health))
        .route("/metrics", get(handlers::nodes::metrics))
        .route("/v1/nodes", get(handlers::nodes::list_nodes))
        .route("/v1/inference", post(handlers::inference::serve))
        .route("/v1/poc/proofs", post(handlers::proofs::serve_proofs))
        .route(
            "/v2/poc-batches/generated",
            post(handlers::callbacks::generated),
        )
        .route(
            "/v2/poc-batches/validated",
            post(handlers::callbacks::validated),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
