//! # Inference-Grid Test Suite
//!
//! Unified test crate for cross-subsystem flows.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── exchange.rs   # V2 proof exchange over real HTTP
//!     ├── phases.rs     # chain edges driving the broker's reconciler
//!     └── commits.rs    # callback → store → commit worker → chain
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p grid-tests
//!
//! # By flow
//! cargo test -p grid-tests integration::exchange
//! ```

pub mod integration;
