//! Core scheduling abstractions and capacity accounting.

pub mod admission;
pub mod client;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod store;
pub mod sweeper;

pub use admission::{Admission, AdmissionQueue, QueueSnapshot, SweepSummary};
pub use client::{AnalysisClient, DispatchOutcome};
pub use error::{AppResult, SchedulerError};
pub use events::{BroadcastEventSink, EventSink, InMemoryEventSink, ReportEvent, Transition};
pub use scheduler::Scheduler;
pub use store::{ReportErrorKind, ReportStore};
pub use sweeper::{Sweeper, SweeperHandle};
