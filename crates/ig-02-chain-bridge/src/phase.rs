//! Pure epoch-position derivation.
//!
//! Given a block height and the chain's epoch timing parameters, compute
//! the epoch index, the PoC stage start height, and the current phase.
//! The chain is the authority on windows; this derivation is the node's
//! local view and must agree with it for well-formed parameters.
//!
//! Within one epoch of length `L` starting at the stage height:
//!
//! ```text
//! [0 ............ stage) PoCGenerate
//! [stage .... exch+delay) PoCGenerateWindDown
//! [ .... +validation_dur) PoCValidate
//! [ ...... +set_new_vals) PoCValidateWindDown
//! [ ................... L) Inference
//! ```
//!
//! The gap between the exchange window and validation start
//! (`poc_validation_delay`) is folded into the wind-down phase; store
//! commits landing there are rejected by the chain regardless.

use shared_types::{BlockHeight, EpochIndex, EpochParams, EpochPhase};

/// Epoch position of one block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochPosition {
    /// Epoch the height falls into.
    pub epoch_index: EpochIndex,
    /// Height at which the epoch's PoC generation began.
    pub poc_start_block_height: BlockHeight,
    /// Phase at the height.
    pub phase: EpochPhase,
}

/// Compute the epoch position of `height`.
///
/// Heights before the first epoch boundary clamp to epoch 0 in the
/// Inference phase (the network serves inference until its first PoC).
pub fn epoch_position(height: BlockHeight, params: &EpochParams) -> EpochPosition {
    let length = params.epoch_length.max(1);
    let shifted = height - params.epoch_shift;

    if shifted < 0 {
        return EpochPosition {
            epoch_index: 0,
            poc_start_block_height: params.epoch_shift,
            phase: EpochPhase::Inference,
        };
    }

    let epoch_index = (shifted / length) as EpochIndex;
    let poc_start = (shifted / length) * length + params.epoch_shift;
    let offset = height - poc_start;

    let generate_end = params.poc_stage_duration;
    let wind_down_end = generate_end + params.poc_exchange_duration + params.poc_validation_delay;
    let validate_end = wind_down_end + params.poc_validation_duration;
    let validate_wind_down_end = validate_end + params.set_new_validators_delay;

    let phase = if offset < generate_end {
        EpochPhase::PocGenerate
    } else if offset < wind_down_end {
        EpochPhase::PocGenerateWindDown
    } else if offset < validate_end {
        EpochPhase::PocValidate
    } else if offset < validate_wind_down_end {
        EpochPhase::PocValidateWindDown
    } else {
        EpochPhase::Inference
    };

    EpochPosition {
        epoch_index,
        poc_start_block_height: poc_start,
        phase,
    }
}
