//! Admission queue: bounded concurrency in front of the analysis service.
//!
//! All bookkeeping lives in one [`QueueState`] behind a single
//! `parking_lot::Mutex`. The lock is only held for map/queue edits and is
//! never held across an `.await`; a slot needed for a network call is
//! reserved first (a `dispatching` entry) and committed to `active` once the
//! analysis service acknowledges the payload.
//!
//! Capacity invariants, observable between any two operations:
//! - `active + dispatching <= max_active`
//! - `pending <= max_size`
//! - a report id is in at most one of pending, dispatching, active
//!
//! Store and client calls are made one entry at a time and a panic inside
//! one of them is caught and recorded against that entry, so the rest of a
//! backfill or sweep pass still runs.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::core::{
    AnalysisClient, DispatchOutcome, EventSink, ReportErrorKind, ReportEvent, ReportStore,
    SchedulerError, Transition,
};
use crate::util::{ReportId, ReportPayload};

/// Result of a successful [`AdmissionQueue::admit`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    /// A slot was free and the report was dispatched right away.
    Dispatched {
        /// What the analysis service said.
        outcome: DispatchOutcome,
    },
    /// All slots were busy; the report waits in the pending buffer.
    Queued {
        /// 1-based position in the pending buffer at enqueue time.
        position: usize,
    },
    /// The report was already pending or active; nothing changed.
    AlreadyTracked,
}

/// Counters for one backfill or sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Active entries reclaimed after the timeout.
    pub expired: usize,
    /// Pending entries accepted downstream.
    pub dispatched: usize,
    /// Pending entries that failed submission or could not be loaded.
    pub failed: usize,
    /// Pending entries dropped because their report no longer exists or was
    /// cancelled mid-flight.
    pub skipped: usize,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Pending ids, head first.
    pub pending: Vec<ReportId>,
    /// Active ids, sorted.
    pub active: Vec<ReportId>,
    /// Reserved slots awaiting a downstream acknowledgement.
    pub dispatching: usize,
    /// Configured slot limit.
    pub max_active: usize,
    /// Configured pending limit.
    pub max_size: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<ReportId>,
    active: HashMap<ReportId, Instant>,
    /// Slot reservations held across a submission, keyed by ticket so a
    /// stale reservation can never release a newer one for the same id.
    dispatching: HashMap<ReportId, u64>,
    next_ticket: u64,
}

impl QueueState {
    fn occupied(&self) -> usize {
        self.active.len() + self.dispatching.len()
    }

    fn is_tracked(&self, id: &ReportId) -> bool {
        self.active.contains_key(id) || self.dispatching.contains_key(id) || self.pending.contains(id)
    }

    fn reserve(&mut self, id: ReportId) -> u64 {
        self.next_ticket += 1;
        self.dispatching.insert(id, self.next_ticket);
        self.next_ticket
    }

    fn release(&mut self, id: &ReportId, ticket: u64) -> bool {
        if self.dispatching.get(id) == Some(&ticket) {
            self.dispatching.remove(id);
            true
        } else {
            false
        }
    }
}

/// A reserved slot. Released on drop unless committed, so a cancelled
/// `admit` future cannot leak capacity.
struct Reservation<'a> {
    state: &'a Mutex<QueueState>,
    id: ReportId,
    ticket: u64,
    armed: bool,
}

impl<'a> Reservation<'a> {
    const fn new(state: &'a Mutex<QueueState>, id: ReportId, ticket: u64) -> Self {
        Self {
            state,
            id,
            ticket,
            armed: true,
        }
    }

    /// Move the reservation into `active`. False if it was cancelled meanwhile.
    fn commit(mut self, dispatched_at: Instant) -> bool {
        self.armed = false;
        let mut state = self.state.lock();
        if state.release(&self.id, self.ticket) {
            state.active.insert(self.id.clone(), dispatched_at);
            true
        } else {
            false
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().release(&self.id, self.ticket);
        }
    }
}

/// Bounded admission queue for report dispatch.
///
/// Reports are dispatched immediately while fewer than `max_active` are in
/// flight, parked FIFO in a pending buffer of at most `max_size` otherwise,
/// and rejected with [`SchedulerError::QueueOverflow`] when both are full.
///
/// Re-admitting an id that is already pending or active is a no-op and
/// returns [`Admission::AlreadyTracked`]; its position and dispatch time are
/// left untouched.
pub struct AdmissionQueue<P, S, C> {
    config: QueueConfig,
    state: Mutex<QueueState>,
    store: Arc<S>,
    client: Arc<C>,
    events: Option<Arc<dyn EventSink>>,
    _payload_marker: PhantomData<fn() -> P>,
}

impl<P, S, C> AdmissionQueue<P, S, C>
where
    P: ReportPayload,
    S: ReportStore<P>,
    C: AnalysisClient<P>,
{
    /// Create a queue from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: QueueConfig, store: Arc<S>, client: Arc<C>) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            config,
            state: Mutex::new(QueueState::default()),
            store,
            client,
            events: None,
            _payload_marker: PhantomData,
        })
    }

    /// Attach an event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Configuration the queue was built with.
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Report store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Accept a report for analysis.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::QueueOverflow`] when every slot is busy and the
    /// pending buffer is full. Submission failures are not errors here: they
    /// are recorded on the store and reported as
    /// [`DispatchOutcome::SubmissionFailed`].
    pub async fn admit(&self, id: ReportId, payload: P) -> Result<Admission, SchedulerError> {
        let reservation = {
            let mut state = self.state.lock();
            if state.is_tracked(&id) {
                tracing::debug!(report_id = %id, "report already tracked, ignoring admission");
                return Ok(Admission::AlreadyTracked);
            }
            if state.occupied() < self.config.max_active {
                let ticket = state.reserve(id.clone());
                Reservation::new(&self.state, id, ticket)
            } else if state.pending.len() < self.config.max_size {
                state.pending.push_back(id.clone());
                let position = state.pending.len();
                drop(state);
                tracing::debug!(report_id = %id, position, "added report to pending queue");
                self.emit(&id, Transition::Queued, None);
                return Ok(Admission::Queued { position });
            } else {
                tracing::warn!(
                    report_id = %id,
                    max_size = self.config.max_size,
                    "request queue exceeded"
                );
                return Err(SchedulerError::QueueOverflow {
                    max_size: self.config.max_size,
                });
            }
        };

        let outcome = self.dispatch(reservation, &payload).await;
        Ok(Admission::Dispatched { outcome })
    }

    /// Completion notice from the analysis service. Frees the active slot.
    ///
    /// Idempotent: unknown ids, duplicates and notices for already expired
    /// entries are ignored. A notice that races an in-flight submission
    /// cancels the reservation so the report never occupies a slot.
    /// Returns whether a slot was freed.
    pub fn received(&self, id: &ReportId) -> bool {
        let freed = {
            let mut state = self.state.lock();
            let was_active = state.active.remove(id).is_some();
            let was_dispatching = state.dispatching.remove(id).is_some();
            was_active || was_dispatching
        };
        if freed {
            tracing::debug!(report_id = %id, "received report, removed from active queue");
            self.emit(id, Transition::Received, None);
        } else {
            tracing::debug!(report_id = %id, "received report that was not active");
        }
        freed
    }

    /// The backing report was deleted. Drops it from every set.
    /// Returns whether it was tracked.
    pub fn deleted(&self, id: &ReportId) -> bool {
        self.deleted_many(std::iter::once(id)) == 1
    }

    /// Batch form of [`AdmissionQueue::deleted`]. Returns how many ids were tracked.
    pub fn deleted_many<'i, I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'i ReportId>,
    {
        let ids: HashSet<&ReportId> = ids.into_iter().collect();
        if ids.is_empty() {
            return 0;
        }
        let removed: Vec<ReportId> = {
            let mut state = self.state.lock();
            let mut removed = Vec::new();
            state.pending.retain(|id| {
                let hit = ids.contains(id);
                if hit {
                    removed.push(id.clone());
                }
                !hit
            });
            for id in &ids {
                let was_active = state.active.remove(*id).is_some();
                let was_dispatching = state.dispatching.remove(*id).is_some();
                if was_active || was_dispatching {
                    removed.push((*id).clone());
                }
            }
            removed
        };
        for id in &removed {
            tracing::debug!(report_id = %id, "deleted report removed from queue");
            self.emit(id, Transition::Deleted, None);
        }
        removed.len()
    }

    /// Promote pending reports into free slots, head first.
    ///
    /// Payloads are re-read from the store. Reports that no longer exist are
    /// skipped; a failed dispatch frees its slot and the next pending report
    /// is tried.
    pub async fn backfill(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        loop {
            let reservation = {
                let mut state = self.state.lock();
                if state.occupied() >= self.config.max_active {
                    break;
                }
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                let ticket = state.reserve(id.clone());
                Reservation::new(&self.state, id, ticket)
            };
            let id = reservation.id.clone();
            tracing::debug!(report_id = %id, "polled report from the pending queue");

            match catch_panic(self.store.find_by_id(&id), SchedulerError::Store).await {
                Ok(Some(payload)) => match self.dispatch(reservation, &payload).await {
                    DispatchOutcome::Sent => summary.dispatched += 1,
                    DispatchOutcome::SubmissionFailed(_) => summary.failed += 1,
                    DispatchOutcome::Skipped => summary.skipped += 1,
                },
                Ok(None) => {
                    drop(reservation);
                    tracing::debug!(report_id = %id, "pending report no longer exists, skipping");
                    summary.skipped += 1;
                }
                Err(e) => {
                    drop(reservation);
                    let message = e.to_string();
                    tracing::error!(report_id = %id, error = %message, "unable to load pending report");
                    self.record_error(&id, ReportErrorKind::InvalidPayload, &message)
                        .await;
                    self.emit(&id, Transition::SubmissionFailed, Some(message));
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Reclaim active entries dispatched more than `timeout` before `now`.
    ///
    /// One reference instant is used for the whole pass. Each entry is
    /// recorded as expired on the store before its slot is released; an entry
    /// that completed or was deleted meanwhile keeps its fate. Returns the
    /// reclaimed ids, sorted.
    pub async fn expire_stale(&self, now: Instant) -> Vec<ReportId> {
        let timeout = self.config.timeout;
        let mut candidates: Vec<(ReportId, Instant)> = {
            let state = self.state.lock();
            state
                .active
                .iter()
                .filter(|(_, dispatched_at)| now.saturating_duration_since(**dispatched_at) > timeout)
                .map(|(id, dispatched_at)| (id.clone(), *dispatched_at))
                .collect()
        };
        if candidates.is_empty() {
            return Vec::new();
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let message = format!("timeout after {}", humantime::format_duration(timeout));
        let mut expired = Vec::with_capacity(candidates.len());
        for (id, dispatched_at) in candidates {
            if self.state.lock().active.get(&id) != Some(&dispatched_at) {
                continue;
            }
            tracing::warn!(report_id = %id, timeout = ?timeout, "expired report");
            self.record_error(&id, ReportErrorKind::Expired, &message).await;

            let reclaimed = {
                let mut state = self.state.lock();
                if state.active.get(&id) == Some(&dispatched_at) {
                    state.active.remove(&id);
                    true
                } else {
                    false
                }
            };
            if reclaimed {
                self.emit(&id, Transition::Expired, Some(message.clone()));
                expired.push(id);
            }
        }
        expired
    }

    /// One sweeper pass: reclaim stale entries, then backfill.
    pub async fn sweep(&self) -> SweepSummary {
        self.sweep_at(Instant::now()).await
    }

    /// [`AdmissionQueue::sweep`] with an explicit reference instant.
    pub async fn sweep_at(&self, now: Instant) -> SweepSummary {
        let expired = self.expire_stale(now).await.len();
        let summary = self.backfill().await;
        SweepSummary { expired, ..summary }
    }

    /// Current queue contents.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        let mut active: Vec<ReportId> = state.active.keys().cloned().collect();
        active.sort();
        QueueSnapshot {
            pending: state.pending.iter().cloned().collect(),
            active,
            dispatching: state.dispatching.len(),
            max_active: self.config.max_active,
            max_size: self.config.max_size,
        }
    }

    /// Whether `id` waits in the pending buffer.
    pub fn is_pending(&self, id: &ReportId) -> bool {
        self.state.lock().pending.contains(id)
    }

    /// Whether `id` occupies an active slot.
    pub fn is_active(&self, id: &ReportId) -> bool {
        self.state.lock().active.contains_key(id)
    }

    async fn dispatch(&self, reservation: Reservation<'_>, payload: &P) -> DispatchOutcome {
        let id = reservation.id.clone();
        tracing::debug!(report_id = %id, "submitting report");
        match catch_panic(self.client.submit(payload), SchedulerError::Submission).await {
            Ok(()) => {
                if !reservation.commit(Instant::now()) {
                    tracing::debug!(report_id = %id, "report left the queue during submission");
                    return DispatchOutcome::Skipped;
                }
                if let Err(e) = catch_panic(self.store.mark_sent(&id), SchedulerError::Store).await {
                    tracing::error!(report_id = %id, error = %e, "unable to mark report as sent");
                }
                tracing::info!(report_id = %id, "report sent for analysis");
                self.emit(&id, Transition::Sent, None);
                DispatchOutcome::Sent
            }
            Err(e) => {
                drop(reservation);
                let message = e.to_string();
                tracing::error!(report_id = %id, error = %message, "unable to submit report");
                self.record_error(&id, ReportErrorKind::SubmissionFailed, &message)
                    .await;
                self.emit(&id, Transition::SubmissionFailed, Some(message.clone()));
                DispatchOutcome::SubmissionFailed(message)
            }
        }
    }

    async fn record_error(&self, id: &ReportId, kind: ReportErrorKind, message: &str) {
        if let Err(e) = catch_panic(self.store.mark_error(id, kind, message), SchedulerError::Store).await {
            tracing::error!(report_id = %id, kind = %kind, error = %e, "unable to record report error");
        }
    }

    fn emit(&self, id: &ReportId, transition: Transition, detail: Option<String>) {
        if let Some(events) = &self.events {
            events.emit(ReportEvent::new(id.clone(), transition, detail));
        }
    }
}

/// Await a collaborator call, turning a panic into the error built by `wrap`.
async fn catch_panic<T, F>(call: F, wrap: fn(String) -> SchedulerError) -> Result<T, SchedulerError>
where
    F: Future<Output = Result<T, SchedulerError>>,
{
    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(wrap(format!("panicked: {}", panic_message(panic.as_ref())))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
