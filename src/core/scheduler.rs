//! Running scheduler: an admission queue plus its sweeper.

use std::sync::Arc;

use crate::core::{
    Admission, AdmissionQueue, AnalysisClient, QueueSnapshot, ReportStore, SchedulerError,
    Sweeper, SweeperHandle,
};
use crate::util::{ReportId, ReportPayload};

/// Single-instance scheduler owning the queue and its sweep task.
///
/// Completion notices backfill eagerly: [`Scheduler::received`] promotes
/// pending reports into the freed slot instead of waiting for the next
/// sweep.
pub struct Scheduler<P, S, C> {
    queue: Arc<AdmissionQueue<P, S, C>>,
    sweeper: SweeperHandle,
}

impl<P, S, C> Scheduler<P, S, C>
where
    P: ReportPayload,
    S: ReportStore<P>,
    C: AnalysisClient<P>,
{
    /// Start the sweeper for `queue` at the configured cadence.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(queue: AdmissionQueue<P, S, C>) -> Self {
        let interval = queue.config().sweep_interval;
        let queue = Arc::new(queue);
        let sweeper = Sweeper::spawn(Arc::clone(&queue), interval);
        Self { queue, sweeper }
    }

    /// Shared handle to the underlying queue.
    pub const fn queue(&self) -> &Arc<AdmissionQueue<P, S, C>> {
        &self.queue
    }

    /// See [`AdmissionQueue::admit`].
    ///
    /// # Errors
    ///
    /// [`SchedulerError::QueueOverflow`] when the pending buffer is full.
    pub async fn admit(&self, id: ReportId, payload: P) -> Result<Admission, SchedulerError> {
        self.queue.admit(id, payload).await
    }

    /// Completion notice; frees the slot and backfills from pending.
    pub async fn received(&self, id: &ReportId) {
        if self.queue.received(id) {
            self.queue.backfill().await;
        }
    }

    /// See [`AdmissionQueue::deleted`].
    pub fn deleted(&self, id: &ReportId) -> bool {
        self.queue.deleted(id)
    }

    /// See [`AdmissionQueue::deleted_many`].
    pub fn deleted_many<'i, I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'i ReportId>,
    {
        self.queue.deleted_many(ids)
    }

    /// See [`AdmissionQueue::snapshot`].
    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    /// Whether the sweeper task is alive.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the sweeper. Queue state is dropped with the scheduler.
    pub async fn shutdown(self) {
        self.sweeper.shutdown().await;
        tracing::info!("scheduler shut down");
    }
}
