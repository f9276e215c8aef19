//! Cross-subsystem integration flows.

pub mod commits;
pub mod exchange;
pub mod phases;
