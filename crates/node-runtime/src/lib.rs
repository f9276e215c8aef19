//! # Inference-Grid Node Runtime
//!
//! The per-participant API node: manages a fleet of local ML worker
//! nodes and validates the Proof-of-Compute work of other participants,
//! phase gated by the external chain.
//!
//! ## Subsystems
//!
//! 1. ML Node Client (ig-01)
//! 2. Chain Bridge, PhaseTracker, Chain Follower (ig-02)
//! 3. Artifact Store (ig-03)
//! 4. Node Broker (ig-04)
//! 5. Commit Worker (ig-05)
//! 6. PoC Validator (ig-06)
//! 7. API Gateway (ig-07)
//!
//! Wiring order follows dependency order: the bridge and tracker first,
//! stores next, then the broker, then the chain-time consumers, finally
//! the HTTP surface.

pub mod config;
pub mod wiring;

pub use config::NodeConfig;
pub use wiring::run_node;
