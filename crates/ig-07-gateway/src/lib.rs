//! # API Gateway Subsystem
//!
//! The node's public HTTP surface, one axum router:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /v1/poc/proofs` | Serve MMR inclusion proofs from the local stage store (signed requests only) |
//! | `POST /v2/poc-batches/generated` | ML worker callback: append generated artifacts (phase gated) |
//! | `POST /v2/poc-batches/validated` | ML worker callback: statistical verdict → chain submission |
//! | `POST /v1/inference` | Inference dispatch: lock a node, forward, release, retry per policy |
//! | `GET /v1/nodes` | Fleet snapshot |
//! | `GET /metrics` | Prometheus exposition |
//! | `GET /health` | Liveness |

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod router;

pub use dispatch::{dispatch_inference, DispatchConfig, DispatchOutcome};
pub use error::GatewayError;
pub use router::{build_router, AppState};
