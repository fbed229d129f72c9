//! # Report Admission
//!
//! Admission control and timeout recovery for vulnerability-analysis reports.
//!
//! Reports derived from SBOMs are forwarded to a downstream analysis service
//! that can only work on a handful of them at once. This crate sits between
//! the request layer and that service:
//!
//! - **Bounded concurrency**: at most `max_active` reports are in flight
//! - **Bounded backlog**: overflow waits FIFO in a pending buffer of at most
//!   `max_size`; beyond that admission fails with a rate-limit style error
//! - **Timeout recovery**: a periodic sweeper reclaims reports that never
//!   completed, records them as expired and backfills the freed slots
//! - **Durable outcomes**: every transition is written to the external report
//!   store; the queue itself is in-memory and single-instance
//!
//! ## Scheduler
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use report_admission::builders::SchedulerBuilder;
//! use report_admission::config::QueueConfig;
//! use report_admission::infra::{HttpAnalysisClient, InMemoryReportStore};
//!
//! let store = Arc::new(InMemoryReportStore::<serde_json::Value>::new());
//! let client = Arc::new(HttpAnalysisClient::new("http://analysis:8080/scan").with_pointer("/input"));
//!
//! let scheduler = SchedulerBuilder::new(QueueConfig::from_env()?)
//!     .start(store, client)?;
//!
//! match scheduler.admit("report-1".into(), report_json).await {
//!     Ok(admission) => tracing::info!(?admission, "accepted"),
//!     Err(e) if e.is_overload() => { /* answer 429 */ }
//!     Err(e) => return Err(e.into()),
//! }
//!
//! // Later, when the analysis output arrives:
//! scheduler.received(&"report-1".into()).await;
//! ```
//!
//! For complete scenarios, see `tests/admission_test.rs` and
//! `tests/sweeper_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for the admission queue.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure adapters for the report store and analysis service.
pub mod infra;
/// API-facing request/response models.
pub mod runtime;
/// Shared utilities.
pub mod util;
