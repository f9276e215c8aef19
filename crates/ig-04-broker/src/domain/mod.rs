//! Broker domain logic: pure state and rules, no I/O.
//!
//! Everything here is synchronous and owned by the broker actor; the
//! service layer is the only caller.

pub mod locks;
pub mod reconcile;
pub mod registry;

pub use locks::LockTable;
pub use reconcile::{compute_target, Target};
pub use registry::{NodeRegistry, RegisteredNode};
