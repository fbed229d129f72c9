//! Infrastructure adapters for the report store and the analysis service.

pub mod client;
pub mod store;

#[cfg(feature = "http-client")]
pub use client::HttpAnalysisClient;
pub use store::InMemoryReportStore;
