//! Per-node worker: a single-writer loop with a one-slot intake.
//!
//! The broker guarantees at most one dispatched command per worker; the
//! one-slot channel enforces it structurally. Results travel back to the
//! broker as `WorkerResult` commands so every state mutation stays on the
//! actor. Cancellation aborts the in-flight remote call (by dropping its
//! future) and reports the pre-command status unchanged.

pub mod command;

pub use command::{InferenceUpPlan, NodeResult, NodeWorkerCommand, TrainingPlan, WorkerContext};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::commands::BrokerCommand;

/// One unit of dispatched work.
pub struct WorkerJob {
    /// What to run.
    pub command: NodeWorkerCommand,
    /// Against which node, with which client.
    pub context: WorkerContext,
}

/// Handle owned by the broker for one node's worker task.
pub struct NodeWorkerHandle {
    job_tx: mpsc::Sender<WorkerJob>,
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl NodeWorkerHandle {
    /// Spawn a worker; results flow into `results` (the broker intake).
    pub fn spawn(node_id: String, results: mpsc::Sender<BrokerCommand>) -> Self {
        let (job_tx, job_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(run_worker(node_id, job_rx, cancel_rx, results));
        Self {
            job_tx,
            cancel_tx,
            join,
        }
    }

    /// Dispatch a job without blocking. Returns `false` when the one-slot
    /// intake is full; the broker's in-flight tracking makes that a bug,
    /// so callers log it loudly.
    pub fn try_dispatch(&self, job: WorkerJob) -> bool {
        self.job_tx.try_send(job).is_ok()
    }

    /// Signal the worker to stop, aborting any in-flight remote call.
    pub fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Client refresh notification. Clients are built per job from the
    /// node's current URLs, so there is nothing to refresh; safe to call
    /// repeatedly.
    pub fn refresh_client_immediate(&self, old_version: &str, new_version: &str) {
        debug!(
            old_version,
            new_version, "[ig-04] Client refresh requested; per-job clients need none"
        );
    }

    /// Await worker termination (after `shutdown`).
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

async fn run_worker(
    node_id: String,
    mut jobs: mpsc::Receiver<WorkerJob>,
    mut cancel: watch::Receiver<bool>,
    results: mpsc::Sender<BrokerCommand>,
) {
    info!(node = %node_id, "[ig-04] Node worker started");

    loop {
        let job = tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
                continue;
            }
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let label = job.command.label();
        debug!(node = %node_id, command = label, "[ig-04] Executing");
        grid_telemetry::WORKER_COMMANDS_TOTAL.inc();

        let result = tokio::select! {
            _ = wait_for_cancel(&mut cancel) => canceled_result(&job),
            result = job.command.execute(&job.context) => result,
        };

        if !result.succeeded && !result.canceled {
            grid_telemetry::WORKER_COMMANDS_FAILED.inc();
        }

        // The broker may already be gone during shutdown; that's fine.
        if results
            .send(BrokerCommand::WorkerResult { result })
            .await
            .is_err()
        {
            break;
        }

        if *cancel.borrow() {
            break;
        }
    }

    info!(node = %node_id, "[ig-04] Node worker stopped");
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped; treat as cancellation.
            return;
        }
    }
}

fn canceled_result(job: &WorkerJob) -> NodeResult {
    let (target_status, target_poc) = job.command.target(&job.context);
    NodeResult {
        node_id: job.context.node_id.clone(),
        succeeded: false,
        error: Some("canceled".to_string()),
        final_status: job.context.current_status,
        final_poc_status: job.context.current_poc_status,
        original_target: target_status,
        original_poc_target: target_poc,
        canceled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ig_01_ml_client::MockMlNodeClient;
    use shared_types::{HardwareStatus, PocStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn job(client: &MockMlNodeClient, command: NodeWorkerCommand) -> WorkerJob {
        WorkerJob {
            command,
            context: WorkerContext {
                node_id: "node1".to_string(),
                node_num: 1,
                client: Arc::new(client.clone()),
                current_status: HardwareStatus::Inference,
                current_poc_status: PocStatus::Idle,
            },
        }
    }

    #[tokio::test]
    async fn test_worker_executes_and_reports() {
        let (results_tx, mut results_rx) = mpsc::channel(8);
        let worker = NodeWorkerHandle::spawn("node1".to_string(), results_tx);
        let mock = MockMlNodeClient::new();

        assert!(worker.try_dispatch(job(&mock, NodeWorkerCommand::Stop)));

        let BrokerCommand::WorkerResult { result } = tokio::time::timeout(
            Duration::from_secs(1),
            results_rx.recv(),
        )
        .await
        .expect("timeout")
        .expect("result")
        else {
            panic!("expected WorkerResult");
        };

        assert!(result.succeeded);
        assert_eq!(result.final_status, HardwareStatus::Stopped);
        assert_eq!(mock.calls("stop"), 1);

        worker.shutdown();
        worker.join().await;
    }

    #[tokio::test]
    async fn test_one_slot_intake_rejects_excess_dispatch() {
        // A full results channel wedges the worker after its first
        // command, so at most one dispatched job can drain: the intake
        // slot bounds everything beyond that.
        let (results_tx, mut results_rx) = mpsc::channel(1);
        results_tx
            .try_send(BrokerCommand::TriggerStatusQuery {
                force_probe: false,
                reply: tokio::sync::oneshot::channel().0,
            })
            .unwrap();

        let worker = NodeWorkerHandle::spawn("node1".to_string(), results_tx);
        let mock = MockMlNodeClient::new();

        let mut accepted = 0;
        for _ in 0..4 {
            if worker.try_dispatch(job(
                &mock,
                NodeWorkerCommand::NoOp {
                    message: "fill".to_string(),
                },
            )) {
                accepted += 1;
            }
        }
        // One job may have been picked up, one sits in the slot; the
        // rest bounce off the full intake.
        assert!(accepted <= 2, "accepted {accepted}");
        assert!(accepted >= 1);

        // Dropping the receiver unblocks the worker's result send.
        worker.shutdown();
        drop(results_rx);
        tokio::time::timeout(Duration::from_secs(1), worker.join())
            .await
            .expect("worker should stop");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_quickly() {
        let (results_tx, _results_rx) = mpsc::channel(8);
        let worker = NodeWorkerHandle::spawn("node1".to_string(), results_tx);

        worker.shutdown();
        tokio::time::timeout(Duration::from_secs(1), worker.join())
            .await
            .expect("worker should stop within bounded time");
    }
}
