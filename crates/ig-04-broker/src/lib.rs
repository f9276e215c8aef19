//! # Node Broker Subsystem
//!
//! Authoritative owner of the per-participant ML node fleet. One actor
//! task drains one command channel; every mutation of fleet state (the
//! node registry, lifecycle state, lock table, administrative state)
//! happens on that task. Remote work never blocks the command loop: it is
//! delegated to per-node workers that report back through the same
//! channel.
//!
//! ```text
//!            BrokerHandle (typed commands + oneshot replies)
//!                 │
//!                 ▼
//!    ┌───────────────────────────┐    one-slot intake    ┌────────────┐
//!    │        Broker actor       │ ───────────────────▶  │ NodeWorker │──▶ ML worker
//!    │  registry / locks / admin │ ◀─────────────────────│  (per node)│
//!    │  reconciler (edge-driven) │     WorkerResult      └────────────┘
//!    └───────────────────────────┘
//! ```
//!
//! ## Reconciliation
//!
//! The reconciler is edge-triggered: phase changes, epoch changes, admin
//! changes, fleet changes, and explicit status queries mark the state
//! dirty, and one pass runs once the intake drains. Each pass computes a
//! `(target_status, target_poc_status)` per node and enqueues at most one
//! worker command per node toward it; a node with a command in flight is
//! left alone until its result lands.
//!
//! ## Locks
//!
//! Inference admission is a counted reservation per node, bounded by
//! `max_concurrent`, granted only to operational nodes in INFERENCE
//! status. Selection prefers the least-loaded node, tie-broken by id.
//! Releases are the caller's obligation; the broker never expires a lock,
//! but removing or updating a node releases everything it held.

pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod handle;
pub mod service;
pub mod trigger;
pub mod worker;

pub use commands::{BrokerCommand, LockOutcome, NodeLease, StatusUpdate};
pub use config::{BrokerConfig, BrokerIdentity};
pub use error::BrokerError;
pub use handle::BrokerHandle;
pub use service::Broker;
pub use trigger::BrokerEventLoop;
pub use worker::{NodeResult, NodeWorkerCommand};
