//! Chain-edge trigger loop for the broker.
//!
//! Subscribes to the shared bus and turns chain edges into broker
//! commands: phase changes kick the reconciler, epoch changes refresh the
//! chain context first. A periodic probe keeps reconciliation converging
//! even when the chain is quiet.

use std::sync::Arc;
use std::time::Duration;

use ig_02_chain_bridge::ChainBridge;
use shared_bus::{EventFilter, EventTopic, GridEvent, InMemoryEventBus};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::handle::BrokerHandle;

/// Default periodic probe interval.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Drives the broker from bus edges and a probe ticker.
pub struct BrokerEventLoop {
    broker: BrokerHandle,
    bridge: Arc<dyn ChainBridge>,
    bus: Arc<InMemoryEventBus>,
    probe_interval: Duration,
}

impl BrokerEventLoop {
    /// Wire the loop; call [`Self::run`] on a task.
    pub fn new(
        broker: BrokerHandle,
        bridge: Arc<dyn ChainBridge>,
        bus: Arc<InMemoryEventBus>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            broker,
            bridge,
            bus,
            probe_interval,
        }
    }

    /// Run until shutdown. Consumes phase, epoch, and confirmation edges.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("[ig-04] Broker event loop starting");
        let mut subscription = self.bus.subscribe(EventFilter::topics(vec![
            EventTopic::Phase,
            EventTopic::Epoch,
            EventTopic::Confirmation,
        ]));
        let mut probe = tokio::time::interval(self.probe_interval);
        probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Seed the chain context before the first edge arrives.
        self.refresh_chain_context().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[ig-04] Broker event loop stopping");
                        return;
                    }
                }
                _ = probe.tick() => {
                    let _ = self.broker.trigger_status_query(false).await;
                }
                event = subscription.recv() => {
                    let Some(event) = event else { return };
                    match event {
                        GridEvent::EpochAdvanced { .. } => {
                            self.refresh_chain_context().await;
                            let _ = self.broker.trigger_status_query(false).await;
                        }
                        GridEvent::PhaseChanged { .. }
                        | GridEvent::ConfirmationPhaseChanged { .. } => {
                            let _ = self.broker.trigger_status_query(false).await;
                        }
                        GridEvent::BlockObserved { .. } => {}
                    }
                }
            }
        }
    }

    async fn refresh_chain_context(&self) {
        let params = match self.bridge.params().await {
            Ok(params) => params,
            Err(e) => {
                warn!("[ig-04] Params refresh failed: {e}");
                return;
            }
        };
        let governance_models = match self.bridge.governance_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("[ig-04] Governance models refresh failed: {e}");
                return;
            }
        };
        let _ = self
            .broker
            .set_chain_context(params, governance_models)
            .await;
    }
}
