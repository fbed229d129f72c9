//! Periodic reclamation and backfill.
//!
//! The sweeper is a tokio task owned by a [`SweeperHandle`]. Collaborator
//! panics are caught per entry inside [`AdmissionQueue::sweep`]; each tick
//! also runs in its own task so that anything escaping it (an event sink,
//! say) cannot end the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::{AdmissionQueue, AnalysisClient, ReportStore, SweepSummary};
use crate::util::ReportPayload;

/// Spawns the periodic sweep task.
pub struct Sweeper;

impl Sweeper {
    /// Start sweeping `queue` every `interval`. The first sweep runs one
    /// full interval after start.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P, S, C>(queue: Arc<AdmissionQueue<P, S, C>>, interval: Duration) -> SweeperHandle
    where
        P: ReportPayload,
        S: ReportStore<P>,
        C: AnalysisClient<P>,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval = ?interval, "queue sweeper started");

            loop {
                tokio::select! {
                    // Only `true` is ever sent; a closed channel also means stop.
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let queue = Arc::clone(&queue);
                        match tokio::spawn(async move { queue.sweep().await }).await {
                            Ok(summary) => {
                                if summary != SweepSummary::default() {
                                    tracing::debug!(
                                        expired = summary.expired,
                                        dispatched = summary.dispatched,
                                        failed = summary.failed,
                                        skipped = summary.skipped,
                                        "sweep finished"
                                    );
                                }
                            }
                            Err(e) => tracing::error!(error = %e, "sweep tick aborted"),
                        }
                    }
                }
            }
            tracing::info!("queue sweeper stopped");
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Owner of a running sweeper. Dropping it signals the task to stop.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Whether the sweep task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweeper and wait for the current tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "queue sweeper join failed");
        }
    }
}
