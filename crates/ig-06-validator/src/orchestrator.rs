//! Stage orchestration: variant selection and at-most-once dispatch.

use std::collections::HashSet;
use std::sync::Arc;

use shared_bus::{EventFilter, EventTopic, GridEvent, InMemoryEventBus};
use shared_types::{BlockHeight, ConfirmationPhase, EpochPhase, PhaseSnapshot};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::offchain::OffChainValidator;
use crate::onchain::OnChainValidator;

/// Protocol variant for one validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Legacy on-chain batches.
    V1,
    /// Off-chain MMR commits.
    V2,
}

/// Pick the variant for the stage described by a snapshot.
///
/// V2 when the global flag is on, or when the stage is a confirmation
/// event's first run (`event_sequence == 0`) and confirmation-V2 is on.
pub fn choose_variant(snapshot: &PhaseSnapshot) -> Variant {
    if snapshot.poc_v2_enabled {
        return Variant::V2;
    }
    if snapshot.confirmation_poc_v2_enabled {
        if let Some(event) = &snapshot.active_confirmation_event {
            if event.event_sequence == 0 {
                return Variant::V2;
            }
        }
    }
    Variant::V1
}

/// Listens for validation-phase edges and runs the matching validator.
pub struct Orchestrator {
    bus: Arc<InMemoryEventBus>,
    offchain: Arc<OffChainValidator>,
    onchain: Arc<OnChainValidator>,
    started: HashSet<BlockHeight>,
    /// Latest `(poc_v2_enabled, confirmation_poc_v2_enabled)` flags seen.
    flags: (bool, bool),
}

impl Orchestrator {
    /// Wire an orchestrator; call [`Self::run`] on a task.
    pub fn new(
        bus: Arc<InMemoryEventBus>,
        offchain: Arc<OffChainValidator>,
        onchain: Arc<OnChainValidator>,
    ) -> Self {
        Self {
            bus,
            offchain,
            onchain,
            started: HashSet::new(),
            flags: (false, false),
        }
    }

    /// At-most-once guard per stage height.
    fn mark_started(&mut self, stage: BlockHeight) -> bool {
        self.started.insert(stage)
    }

    /// Run until shutdown, dispatching one validation per stage.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("[ig-06] Validator orchestrator starting");
        let mut subscription = self.bus.subscribe(EventFilter::topics(vec![
            EventTopic::Phase,
            EventTopic::Confirmation,
        ]));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[ig-06] Validator orchestrator stopping");
                        return;
                    }
                }
                event = subscription.recv() => {
                    let Some(event) = event else { return };
                    match event {
                        GridEvent::PhaseChanged { snapshot } => {
                            self.flags =
                                (snapshot.poc_v2_enabled, snapshot.confirmation_poc_v2_enabled);
                            if snapshot.current_phase == EpochPhase::PocValidate {
                                let stage = snapshot.poc_start_block_height;
                                if self.mark_started(stage) {
                                    self.dispatch(
                                        choose_variant(&snapshot),
                                        stage,
                                        snapshot.poc_start_block_hash.clone(),
                                    );
                                }
                            }
                        }
                        GridEvent::ConfirmationPhaseChanged { event: Some(confirmation) }
                            if confirmation.phase == ConfirmationPhase::Validate =>
                        {
                            let stage = confirmation.trigger_height;
                            if self.mark_started(stage) {
                                // Confirmation variants follow the same
                                // flag rules as regular stages.
                                let snapshot = PhaseSnapshot {
                                    active_confirmation_event: Some(confirmation.clone()),
                                    ..self.snapshot_for_flags()
                                };
                                self.dispatch(
                                    choose_variant(&snapshot),
                                    stage,
                                    confirmation.poc_seed_block_hash.clone(),
                                );
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn snapshot_for_flags(&self) -> PhaseSnapshot {
        // Flags travel on every phase edge; the confirmation arm only
        // needs them, so a skeleton snapshot is enough.
        PhaseSnapshot {
            block_height: 0,
            block_hash: String::new(),
            epoch_index: 0,
            poc_start_block_height: 0,
            poc_start_block_hash: String::new(),
            current_phase: EpochPhase::Inference,
            active_confirmation_event: None,
            is_synced: true,
            poc_v2_enabled: self.flags.0,
            confirmation_poc_v2_enabled: self.flags.1,
        }
    }

    fn dispatch(&self, variant: Variant, stage: BlockHeight, seed_hash: String) {
        info!(stage, ?variant, "[ig-06] Dispatching validation stage");
        match variant {
            Variant::V2 => {
                let validator = self.offchain.clone();
                tokio::spawn(async move {
                    if let Err(e) = validator.run_stage(stage, &seed_hash).await {
                        warn!(stage, "[ig-06] V2 stage failed: {e}");
                    }
                });
            }
            Variant::V1 => {
                let validator = self.onchain.clone();
                tokio::spawn(async move {
                    if let Err(e) = validator.run_stage(stage).await {
                        warn!(stage, "[ig-06] V1 stage failed: {e}");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(v2: bool, confirmation_v2: bool, sequence: Option<u64>) -> PhaseSnapshot {
        PhaseSnapshot {
            block_height: 150,
            block_hash: "H".to_string(),
            epoch_index: 1,
            poc_start_block_height: 100,
            poc_start_block_hash: "SEED".to_string(),
            current_phase: EpochPhase::PocValidate,
            active_confirmation_event: sequence.map(|event_sequence| {
                shared_types::ConfirmationPocEvent {
                    trigger_height: 140,
                    event_sequence,
                    poc_seed_block_hash: "CSEED".to_string(),
                    phase: ConfirmationPhase::Validate,
                }
            }),
            is_synced: true,
            poc_v2_enabled: v2,
            confirmation_poc_v2_enabled: confirmation_v2,
        }
    }

    #[test]
    fn test_variant_selection() {
        // Global flag wins.
        assert_eq!(choose_variant(&snapshot(true, false, None)), Variant::V2);
        assert_eq!(choose_variant(&snapshot(false, false, None)), Variant::V1);

        // Confirmation flag only covers the first event run.
        assert_eq!(choose_variant(&snapshot(false, true, Some(0))), Variant::V2);
        assert_eq!(choose_variant(&snapshot(false, true, Some(1))), Variant::V1);
        // Flag without an active event changes nothing.
        assert_eq!(choose_variant(&snapshot(false, true, None)), Variant::V1);
    }
}
