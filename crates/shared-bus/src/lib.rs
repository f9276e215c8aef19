//! # Shared Bus - Event Bus for Chain-Edge Fan-Out
//!
//! The chain follower observes the external chain and publishes *edges*
//! (new block, phase change, epoch advance, confirmation sub-phase change)
//! to this bus. Subsystems that must react to chain time (the broker's
//! reconciliation trigger, the commit worker, the validator orchestrator)
//! subscribe with a topic filter.
//!
//! ```text
//! ┌────────────────┐                    ┌──────────────────┐
//! │ Chain Follower │                    │ Broker trigger   │
//! │                │    publish()       │ Commit worker    │
//! │                │ ──────┐            │ Orchestrator     │
//! └────────────────┘       │            └──────────────────┘
//!                          ▼                    ↑
//!                    ┌──────────────┐          │
//!                    │  Event Bus   │ ─────────┘
//!                    └──────────────┘  subscribe()
//! ```
//!
//! The bus carries process-internal control flow only; nothing on it is a
//! source of truth. Consumers that lag or subscribe late recover from the
//! PhaseTracker snapshot.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, GridEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lag kicks in.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
