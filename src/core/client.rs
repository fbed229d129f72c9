//! Downstream analysis client interface and dispatch outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::ReportPayload;

/// Client for the downstream analysis service.
///
/// `submit` returns once the service has acknowledged or refused the
/// payload. The analysis result arrives later, out of band.
#[async_trait]
pub trait AnalysisClient<P: ReportPayload>: Send + Sync + 'static {
    /// Forward a payload for analysis.
    async fn submit(&self, payload: &P) -> Result<(), SchedulerError>;
}

/// Result of a single dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Accepted downstream; the report now occupies an active slot.
    Sent,
    /// Refused downstream; recorded on the store, no slot consumed.
    SubmissionFailed(String),
    /// The report was deleted or completed while the submission was in
    /// flight, so it does not occupy a slot.
    Skipped,
}

impl DispatchOutcome {
    /// True when the report ended up in an active slot.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}
