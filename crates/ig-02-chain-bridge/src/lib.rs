//! # Chain Bridge Subsystem
//!
//! The node's only window onto the external chain. Everything chain-shaped
//! flows through the [`ChainBridge`] capability: parameter and epoch
//! queries, commit/validation reads, and signed message submission. On top
//! of the bridge sit two pieces of local machinery:
//!
//! - the [`PhaseTracker`], a write-rarely/read-often snapshot of chain
//!   time (height, epoch, phase, confirmation events, feature flags), and
//! - the [`ChainFollower`], the single writer of that snapshot, which
//!   polls the bridge and publishes *edges* to the shared bus.
//!
//! ## Module Structure
//!
//! ```text
//! ports.rs     - ChainBridge + Signer capability traits
//! phase.rs     - pure epoch-position derivation from EpochParams
//! tracker.rs   - PhaseTracker snapshot cell
//! follower.rs  - polling loop, edge detection, bus publishing
//! http.rs      - reqwest REST adapter (production)
//! signer.rs    - secp256k1 account signer (k256)
//! mock.rs      - recording mock bridge (tests, all subsystems)
//! error.rs     - ChainBridgeError taxonomy
//! ```

pub mod error;
pub mod follower;
pub mod http;
pub mod mock;
pub mod phase;
pub mod ports;
pub mod signer;
pub mod tracker;

pub use error::ChainBridgeError;
pub use follower::{ChainFollower, FollowerConfig};
pub use http::HttpChainBridge;
pub use mock::MockChainBridge;
pub use phase::{epoch_position, EpochPosition};
pub use ports::{ChainBridge, Signer};
pub use signer::{verify_signature, Secp256k1Signer};
pub use tracker::PhaseTracker;
