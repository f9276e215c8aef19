//! # Grid Events
//!
//! Defines the chain-edge events that flow through the shared bus. The
//! chain follower is the only producer; the broker trigger loop, the
//! commit worker, and the validator orchestrator consume.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, ConfirmationPocEvent, EpochIndex, PhaseSnapshot};

/// All events that can be published to the event bus.
///
/// Every event is an *edge*: the follower publishes only when the
/// underlying value changed, never once per poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GridEvent {
    // =========================================================================
    // CHAIN FOLLOWER: BLOCK EDGES
    // =========================================================================
    /// A new block height was observed on the chain.
    BlockObserved {
        /// Observed height.
        height: BlockHeight,
        /// Observed block hash.
        hash: String,
    },

    // =========================================================================
    // CHAIN FOLLOWER: PHASE EDGES
    // =========================================================================
    /// The epoch phase changed. Carries the full snapshot so consumers
    /// never re-read the tracker mid-edge.
    PhaseChanged {
        /// Snapshot taken at the edge.
        snapshot: PhaseSnapshot,
    },

    /// The epoch index advanced.
    EpochAdvanced {
        /// New epoch index.
        epoch_index: EpochIndex,
    },

    /// A confirmation PoC event appeared, advanced a sub-phase, or ended
    /// (`event == None`).
    ConfirmationPhaseChanged {
        /// The event after the edge, if still active.
        event: Option<ConfirmationPocEvent>,
    },
}

impl GridEvent {
    /// Topic used for subscription filtering.
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockObserved { .. } => EventTopic::Block,
            Self::PhaseChanged { .. } => EventTopic::Phase,
            Self::EpochAdvanced { .. } => EventTopic::Epoch,
            Self::ConfirmationPhaseChanged { .. } => EventTopic::Confirmation,
        }
    }
}

/// Topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTopic {
    /// New block observed.
    Block,
    /// Regular phase transitions.
    Phase,
    /// Epoch advancement.
    Epoch,
    /// Confirmation PoC sub-phase transitions.
    Confirmation,
}

/// Filter selecting which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Topics to receive; empty means all.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Receive every event.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Receive only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &GridEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}
