//! Report store interface consumed by the scheduler.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::{ReportId, ReportPayload};

/// Error kinds the scheduler records on a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportErrorKind {
    /// The analysis service rejected the submission.
    SubmissionFailed,
    /// The report stayed active longer than the configured timeout.
    Expired,
    /// The stored report could not be read back for a deferred dispatch.
    InvalidPayload,
}

impl ReportErrorKind {
    /// Stable wire name, as persisted by the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionFailed => "submission-failed",
            Self::Expired => "expired",
            Self::InvalidPayload => "invalid-payload",
        }
    }
}

impl fmt::Display for ReportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of reports, owned outside the scheduler.
///
/// Implementations must be safe for concurrent use. The scheduler never
/// holds its own lock while awaiting a store call.
#[async_trait]
pub trait ReportStore<P: ReportPayload>: Send + Sync + 'static {
    /// Load the payload for a report, `None` if it no longer exists.
    async fn find_by_id(&self, id: &ReportId) -> Result<Option<P>, SchedulerError>;

    /// Record that the report was accepted by the analysis service.
    async fn mark_sent(&self, id: &ReportId) -> Result<(), SchedulerError>;

    /// Record a terminal error on the report.
    async fn mark_error(
        &self,
        id: &ReportId,
        kind: ReportErrorKind,
        message: &str,
    ) -> Result<(), SchedulerError>;
}
