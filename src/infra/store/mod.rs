//! Report store backends.

pub mod memory;

pub use memory::{InMemoryReportStore, ReportError, ReportRecord, ReportStatus};
