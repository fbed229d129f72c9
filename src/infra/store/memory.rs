//! In-memory report store for development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{ReportErrorKind, ReportStore, SchedulerError};
use crate::util::{now_ms, ReportId, ReportPayload};

/// Externally visible report status, derived from the record's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Created for a product, not yet submitted.
    Pending,
    /// Submitted and waiting for an analysis slot.
    Queued,
    /// Accepted by the analysis service.
    Sent,
    /// Analysis output received.
    Completed,
    /// Errored for any reason other than expiry.
    Failed,
    /// Reclaimed after the active timeout.
    Expired,
    /// None of the above could be determined.
    Unknown,
}

/// Error persisted on a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    /// Error kind.
    pub kind: ReportErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// Stored report with lifecycle timestamps (milliseconds since epoch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord<P> {
    /// Payload forwarded to the analysis service.
    pub payload: P,
    /// Owning product, if the report was created from a product upload.
    pub product_id: Option<String>,
    /// When the report was submitted for analysis.
    pub submitted_at_ms: Option<u128>,
    /// When the analysis service accepted it.
    pub sent_at_ms: Option<u128>,
    /// When the analysis output arrived.
    pub completed_at_ms: Option<u128>,
    /// Last recorded error.
    pub error: Option<ReportError>,
}

impl<P> ReportRecord<P> {
    /// Wrap a payload in a fresh record.
    pub const fn new(payload: P) -> Self {
        Self {
            payload,
            product_id: None,
            submitted_at_ms: None,
            sent_at_ms: None,
            completed_at_ms: None,
            error: None,
        }
    }

    /// Derive the status. Errors win over progress, expiry over other errors.
    pub fn status(&self) -> ReportStatus {
        if let Some(error) = &self.error {
            return if error.kind == ReportErrorKind::Expired {
                ReportStatus::Expired
            } else {
                ReportStatus::Failed
            };
        }
        if self.completed_at_ms.is_some() {
            ReportStatus::Completed
        } else if self.sent_at_ms.is_some() {
            ReportStatus::Sent
        } else if self.submitted_at_ms.is_some() {
            ReportStatus::Queued
        } else if self.product_id.is_some() {
            ReportStatus::Pending
        } else {
            ReportStatus::Unknown
        }
    }
}

/// Report store backed by a `HashMap`.
pub struct InMemoryReportStore<P> {
    records: RwLock<HashMap<ReportId, ReportRecord<P>>>,
}

impl<P> Default for InMemoryReportStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> InMemoryReportStore<P> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a report.
    pub fn insert(&self, id: impl Into<ReportId>, payload: P) {
        self.records.write().insert(id.into(), ReportRecord::new(payload));
    }

    /// Insert or replace a report that belongs to a product.
    pub fn insert_for_product(&self, id: impl Into<ReportId>, payload: P, product_id: impl Into<String>) {
        let mut record = ReportRecord::new(payload);
        record.product_id = Some(product_id.into());
        self.records.write().insert(id.into(), record);
    }

    /// Stamp the submission time. False if the report does not exist.
    pub fn mark_submitted(&self, id: &ReportId) -> bool {
        self.update(id, |r| r.submitted_at_ms = Some(now_ms()))
    }

    /// Record analysis output. Clears any earlier error, so a late result
    /// for an expired report still completes it.
    pub fn mark_completed(&self, id: &ReportId) -> bool {
        self.update(id, |r| {
            r.completed_at_ms = Some(now_ms());
            r.error = None;
        })
    }

    /// Prepare a failed or expired report for re-admission: clears the error
    /// and progress stamps and re-stamps submission. Returns the payload to
    /// hand back to the scheduler.
    pub fn retry(&self, id: &ReportId) -> Option<P>
    where
        P: Clone,
    {
        let mut records = self.records.write();
        let record = records.get_mut(id)?;
        record.error = None;
        record.sent_at_ms = None;
        record.completed_at_ms = None;
        record.submitted_at_ms = Some(now_ms());
        Some(record.payload.clone())
    }

    /// Delete a report. False if it did not exist.
    pub fn remove(&self, id: &ReportId) -> bool {
        self.records.write().remove(id).is_some()
    }

    /// Derived status of a report.
    pub fn status(&self, id: &ReportId) -> Option<ReportStatus> {
        self.records.read().get(id).map(ReportRecord::status)
    }

    /// Copy of a stored record.
    pub fn record(&self, id: &ReportId) -> Option<ReportRecord<P>>
    where
        P: Clone,
    {
        self.records.read().get(id).cloned()
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn update(&self, id: &ReportId, f: impl FnOnce(&mut ReportRecord<P>)) -> bool {
        self.records.write().get_mut(id).map(f).is_some()
    }

    fn update_or_missing(
        &self,
        id: &ReportId,
        f: impl FnOnce(&mut ReportRecord<P>),
    ) -> Result<(), SchedulerError> {
        if self.update(id, f) {
            Ok(())
        } else {
            Err(SchedulerError::Store(format!("report {id} not found")))
        }
    }
}

#[async_trait]
impl<P> ReportStore<P> for InMemoryReportStore<P>
where
    P: ReportPayload + Clone,
{
    async fn find_by_id(&self, id: &ReportId) -> Result<Option<P>, SchedulerError> {
        Ok(self.records.read().get(id).map(|r| r.payload.clone()))
    }

    async fn mark_sent(&self, id: &ReportId) -> Result<(), SchedulerError> {
        self.update_or_missing(id, |r| r.sent_at_ms = Some(now_ms()))
    }

    async fn mark_error(
        &self,
        id: &ReportId,
        kind: ReportErrorKind,
        message: &str,
    ) -> Result<(), SchedulerError> {
        self.update_or_missing(id, |r| {
            r.error = Some(ReportError {
                kind,
                message: message.to_owned(),
            });
        })
    }
}
