//! Identifier and payload types shared across the scheduler.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a report in the external report store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ReportId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Marker trait for report payloads forwarded to the analysis service.
///
/// Payloads are never inspected by the scheduler; they only need to cross
/// threads and survive a round trip through the report store.
pub trait ReportPayload: Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> ReportPayload for T where T: Send + Sync + Serialize + DeserializeOwned + 'static {}
