//! API-facing request/response models.
//!
//! The HTTP layer itself lives outside this crate; these types pin the
//! shape of what it exchanges with the scheduler.

use serde::{Deserialize, Serialize};

use crate::core::{Admission, AnalysisClient, QueueSnapshot, ReportStore, Scheduler, SchedulerError};
use crate::util::{ReportId, ReportPayload};

/// HTTP status for "accepted, processing later".
pub const STATUS_ACCEPTED: u16 = 202;
/// HTTP status used for queue overflow.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// HTTP status for configuration problems.
pub const STATUS_INTERNAL_ERROR: u16 = 500;
/// HTTP status for store or downstream failures.
pub const STATUS_BAD_GATEWAY: u16 = 502;

/// Report admission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize", deserialize = "P: serde::de::DeserializeOwned"))]
pub struct AdmissionRequest<P> {
    /// Report identifier.
    pub report_id: ReportId,
    /// Opaque payload.
    pub payload: P,
}

/// Report admission response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionResponse {
    /// HTTP status to answer with.
    pub status: u16,
    /// Report identifier.
    pub report_id: ReportId,
    /// What the scheduler did with it.
    pub admission: Admission,
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status to answer with.
    pub status: u16,
    /// Error message.
    pub error: String,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Queue state at the time of the check.
    pub queue: QueueSnapshot,
}

/// Map a scheduler error to a boundary response.
#[must_use]
pub fn error_response(err: &SchedulerError) -> ErrorResponse {
    let status = match err {
        SchedulerError::QueueOverflow { .. } => STATUS_TOO_MANY_REQUESTS,
        SchedulerError::InvalidConfig(_) => STATUS_INTERNAL_ERROR,
        SchedulerError::Store(_) | SchedulerError::Submission(_) => STATUS_BAD_GATEWAY,
    };
    ErrorResponse {
        status,
        error: err.to_string(),
    }
}

/// Admit a report and shape the boundary response.
///
/// # Errors
///
/// The mapped [`ErrorResponse`] when admission is refused.
pub async fn submit_report<P, S, C>(
    scheduler: &Scheduler<P, S, C>,
    req: AdmissionRequest<P>,
) -> Result<AdmissionResponse, ErrorResponse>
where
    P: ReportPayload,
    S: ReportStore<P>,
    C: AnalysisClient<P>,
{
    let report_id = req.report_id;
    match scheduler.admit(report_id.clone(), req.payload).await {
        Ok(admission) => Ok(AdmissionResponse {
            status: STATUS_ACCEPTED,
            report_id,
            admission,
        }),
        Err(e) => Err(error_response(&e)),
    }
}

/// Return a health payload.
pub fn health<P, S, C>(scheduler: &Scheduler<P, S, C>) -> Health
where
    P: ReportPayload,
    S: ReportStore<P>,
    C: AnalysisClient<P>,
{
    Health {
        ok: scheduler.is_sweeping(),
        queue: scheduler.snapshot(),
    }
}
