//! # Commit Worker Subsystem
//!
//! A background ticker that turns the local stage store into on-chain
//! facts. Every tick (default 100 ms):
//!
//! 1. Resolve the active stage from the phase tracker; a stage change
//!    resets the per-stage memo.
//! 2. Inside the exchange window, flush the stage store and submit a
//!    `StoreCommit`, but only when `(count, root)` moved since the last
//!    accepted commit.
//! 3. Inside the validation phase, derive the per-node weight
//!    distribution from the committed counts (exact-sum scaling) and
//!    submit it, re-attempting on a fixed interval.

pub mod error;
pub mod weights;
pub mod worker;

pub use error::CommitError;
pub use weights::get_weight_distribution;
pub use worker::{CommitConfig, CommitWorker};
