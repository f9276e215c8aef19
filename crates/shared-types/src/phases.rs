//! # Epoch Phases & Phase Gating
//!
//! The chain partitions every epoch into five phases:
//!
//! ```text
//! PoCGenerate → PoCGenerateWindDown → PoCValidate → PoCValidateWindDown → Inference
//! ```
//!
//! A [`PhaseSnapshot`] is the read-only view of the chain follower's state:
//! height, hash, epoch, phase, feature flags, and the active confirmation
//! event (if an ad-hoc spot-check PoC is running during Inference). All
//! acceptance decisions (store commits, generated artifacts, weight
//! distribution) are pure predicates over a snapshot so that every subsystem
//! gates identically.

use serde::{Deserialize, Serialize};

use crate::{BlockHeight, EpochIndex};

/// Phase of the regular epoch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochPhase {
    /// PoC artifact generation window.
    PocGenerate,
    /// Generation has stopped; commits are still exchanged.
    PocGenerateWindDown,
    /// Validators sample and verify committed artifacts.
    PocValidate,
    /// Validation submissions drain; new validator set forms.
    PocValidateWindDown,
    /// Regular inference service.
    Inference,
}

impl EpochPhase {
    /// Whether the exchange window for store commits is open.
    pub fn in_exchange_window(self) -> bool {
        matches!(self, Self::PocGenerate | Self::PocGenerateWindDown)
    }

    /// Whether validation submissions are accepted.
    pub fn in_validation_window(self) -> bool {
        matches!(self, Self::PocValidate | Self::PocValidateWindDown)
    }
}

/// Sub-phase of a confirmation PoC event.
///
/// Confirmation events run the same four PoC sub-phases as the regular
/// cycle, embedded inside the Inference phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationPhase {
    /// Artifact generation.
    Generate,
    /// Commit exchange.
    GenerateWindDown,
    /// Validation.
    Validate,
    /// Validation wind-down.
    ValidateWindDown,
}

/// An ad-hoc PoC event triggered during the Inference phase to spot-check
/// participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPocEvent {
    /// Block height that triggered the event; keys the event's stage store.
    pub trigger_height: BlockHeight,
    /// Sequence number of the event within its epoch.
    pub event_sequence: u64,
    /// Seed hash for this event's PoC generation and sampling.
    pub poc_seed_block_hash: String,
    /// Current sub-phase of the event.
    pub phase: ConfirmationPhase,
}

/// Value snapshot of the chain follower's state.
///
/// Copy-on-read: the follower is the only writer; every reader receives an
/// owned clone and never observes torn state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    /// Latest observed block height.
    pub block_height: BlockHeight,
    /// Hash of the latest observed block.
    pub block_hash: String,
    /// Current epoch index.
    pub epoch_index: EpochIndex,
    /// Height at which the current epoch's PoC generation window began.
    pub poc_start_block_height: BlockHeight,
    /// Hash of the stage start block; seeds PoC generation.
    pub poc_start_block_hash: String,
    /// Current phase of the regular cycle.
    pub current_phase: EpochPhase,
    /// Active confirmation event, if one is running.
    pub active_confirmation_event: Option<ConfirmationPocEvent>,
    /// Whether the follower considers itself caught up with the chain.
    pub is_synced: bool,
    /// Chain flag: the V2 (off-chain/MMR) PoC protocol is enabled.
    pub poc_v2_enabled: bool,
    /// Chain flag: confirmation events use the V2 protocol.
    pub confirmation_poc_v2_enabled: bool,
}

impl PhaseSnapshot {
    /// Whether a store commit for `stage_height` may be submitted now:
    /// the snapshot must be inside the exchange window of that same stage,
    /// or inside the exchange window of a confirmation event keyed by it.
    pub fn should_accept_store_commit(&self, stage_height: BlockHeight) -> bool {
        if self.current_phase.in_exchange_window() && self.poc_start_block_height == stage_height {
            return true;
        }
        match &self.active_confirmation_event {
            Some(ev) => {
                ev.trigger_height == stage_height
                    && matches!(
                        ev.phase,
                        ConfirmationPhase::Generate | ConfirmationPhase::GenerateWindDown
                    )
            }
            None => false,
        }
    }

    /// Whether generated artifacts for `stage_height` may be appended now:
    /// only while the matching stage (regular or confirmation) is generating.
    pub fn should_accept_generated_artifacts(&self, stage_height: BlockHeight) -> bool {
        if self.current_phase == EpochPhase::PocGenerate
            && self.poc_start_block_height == stage_height
        {
            return true;
        }
        match &self.active_confirmation_event {
            Some(ev) => {
                ev.trigger_height == stage_height && ev.phase == ConfirmationPhase::Generate
            }
            None => false,
        }
    }

    /// Whether the weight distribution for the current stage should have
    /// been submitted by now (we are inside the validation phase).
    pub fn should_have_distributed_weights(&self) -> bool {
        self.current_phase == EpochPhase::PocValidate
    }

    /// Whether validation submissions for `stage_height` are in window.
    pub fn should_accept_validation(&self, stage_height: BlockHeight) -> bool {
        if self.current_phase.in_validation_window() && self.poc_start_block_height == stage_height
        {
            return true;
        }
        match &self.active_confirmation_event {
            Some(ev) => {
                ev.trigger_height == stage_height
                    && matches!(
                        ev.phase,
                        ConfirmationPhase::Validate | ConfirmationPhase::ValidateWindDown
                    )
            }
            None => false,
        }
    }

    /// Stage height currently accepting artifacts or commits: the trigger
    /// height of an active confirmation event, otherwise the regular PoC
    /// stage start.
    pub fn active_stage_height(&self) -> BlockHeight {
        match &self.active_confirmation_event {
            Some(ev) => ev.trigger_height,
            None => self.poc_start_block_height,
        }
    }
}
