//! Report transition events.
//!
//! Sinks are informational only: emission never fails and never feeds back
//! into scheduling decisions.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::util::{now_ms, ReportId};

/// Scheduler-visible transitions of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Parked in the pending buffer.
    Queued,
    /// Accepted by the analysis service.
    Sent,
    /// Refused by the analysis service.
    SubmissionFailed,
    /// Reclaimed by the sweeper after the timeout.
    Expired,
    /// Completion notice received.
    Received,
    /// Removed because the backing report was deleted.
    Deleted,
}

/// A single transition notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    /// Unique event identifier.
    pub event_id: String,
    /// Report the event refers to.
    pub report_id: ReportId,
    /// What happened.
    pub transition: Transition,
    /// Timestamp milliseconds.
    pub at_ms: u128,
    /// Additional context, e.g. a failure message.
    pub detail: Option<String>,
}

impl ReportEvent {
    /// Build an event stamped with the current time.
    pub fn new(report_id: ReportId, transition: Transition, detail: Option<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            report_id,
            transition,
            at_ms: now_ms(),
            detail,
        }
    }
}

/// Event sink abstraction.
pub trait EventSink: Send + Sync {
    /// Publish an event.
    fn emit(&self, event: ReportEvent);
}

/// Bounded in-memory sink for testing and dev. Drops the oldest event when full.
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<ReportEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Transitions recorded for one report, oldest first.
    pub fn transitions_for(&self, id: &ReportId) -> Vec<Transition> {
        self.events
            .lock()
            .iter()
            .filter(|e| &e.report_id == id)
            .map(|e| e.transition)
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: ReportEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Fan-out sink for live subscribers (e.g. a notification socket).
pub struct BroadcastEventSink {
    tx: broadcast::Sender<ReportEvent>,
}

impl BroadcastEventSink {
    /// Create a sink whose subscribers lag after `capacity` unread events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: ReportEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
