//! Analysis service clients.

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::HttpAnalysisClient;
