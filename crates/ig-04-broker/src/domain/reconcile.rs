//! Target computation for the reconciler.
//!
//! Pure function of `(admin, epoch, phase, continuity flag)`:
//!
//! | phase | continue-inference | admin | target |
//! |-------|--------------------|-------|--------|
//! | Inference | any | enabled | INFERENCE/IDLE |
//! | PoCGenerate(+WindDown) | false | enabled | POC/GENERATING |
//! | PoCGenerate(+WindDown) | true | enabled | INFERENCE/IDLE |
//! | PoCValidate(+WindDown) | false | enabled | POC/VALIDATING |
//! | PoCValidate(+WindDown) | true | enabled | INFERENCE/IDLE |
//! | any | any | disabled, in grace | INFERENCE/IDLE |
//! | any | any | disabled | STOPPED/IDLE |

use shared_types::{AdminState, EpochIndex, EpochPhase, HardwareStatus, PocStatus};

/// A reconciliation goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Hardware status to drive toward.
    pub status: HardwareStatus,
    /// PoC sub-status to drive toward.
    pub poc_status: PocStatus,
}

impl Target {
    /// Shorthand constructor.
    pub fn new(status: HardwareStatus, poc_status: PocStatus) -> Self {
        Self { status, poc_status }
    }
}

/// Compute the target state of one node.
pub fn compute_target(
    admin: AdminState,
    current_epoch: EpochIndex,
    phase: EpochPhase,
    should_continue_inference: bool,
) -> Target {
    if !admin.enabled {
        // Freshly disabled nodes serve out their effective epoch.
        return if current_epoch == admin.effective_epoch {
            Target::new(HardwareStatus::Inference, PocStatus::Idle)
        } else {
            Target::new(HardwareStatus::Stopped, PocStatus::Idle)
        };
    }

    if should_continue_inference {
        return Target::new(HardwareStatus::Inference, PocStatus::Idle);
    }

    match phase {
        EpochPhase::PocGenerate | EpochPhase::PocGenerateWindDown => {
            Target::new(HardwareStatus::Poc, PocStatus::Generating)
        }
        EpochPhase::PocValidate | EpochPhase::PocValidateWindDown => {
            Target::new(HardwareStatus::Poc, PocStatus::Validating)
        }
        EpochPhase::Inference => Target::new(HardwareStatus::Inference, PocStatus::Idle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENABLED: AdminState = AdminState {
        enabled: true,
        effective_epoch: 5,
    };

    #[test]
    fn test_enabled_targets_follow_phase() {
        assert_eq!(
            compute_target(ENABLED, 5, EpochPhase::Inference, false),
            Target::new(HardwareStatus::Inference, PocStatus::Idle)
        );
        assert_eq!(
            compute_target(ENABLED, 5, EpochPhase::PocGenerate, false),
            Target::new(HardwareStatus::Poc, PocStatus::Generating)
        );
        assert_eq!(
            compute_target(ENABLED, 5, EpochPhase::PocGenerateWindDown, false),
            Target::new(HardwareStatus::Poc, PocStatus::Generating)
        );
        assert_eq!(
            compute_target(ENABLED, 5, EpochPhase::PocValidate, false),
            Target::new(HardwareStatus::Poc, PocStatus::Validating)
        );
    }

    #[test]
    fn test_continuity_reservation_overrides_poc() {
        for phase in [
            EpochPhase::PocGenerate,
            EpochPhase::PocValidate,
            EpochPhase::Inference,
        ] {
            assert_eq!(
                compute_target(ENABLED, 5, phase, true),
                Target::new(HardwareStatus::Inference, PocStatus::Idle)
            );
        }
    }

    #[test]
    fn test_disabled_grace_and_stop() {
        let disabled = AdminState {
            enabled: false,
            effective_epoch: 7,
        };
        // In the effective epoch the node keeps serving.
        assert_eq!(
            compute_target(disabled, 7, EpochPhase::PocGenerate, false),
            Target::new(HardwareStatus::Inference, PocStatus::Idle)
        );
        // Afterwards it stops.
        assert_eq!(
            compute_target(disabled, 8, EpochPhase::Inference, false),
            Target::new(HardwareStatus::Stopped, PocStatus::Idle)
        );
    }
}
