//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Every slot is busy and the pending buffer is at capacity.
    #[error("request queue exceeded: max size {max_size} reached")]
    QueueOverflow {
        /// Configured pending buffer limit.
        max_size: usize,
    },
    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Report store failure with context.
    #[error("report store error: {0}")]
    Store(String),
    /// The analysis service refused or failed the submission.
    #[error("submission failed: {0}")]
    Submission(String),
}

impl SchedulerError {
    /// True when the error means "try again later" at the request boundary.
    #[must_use]
    pub const fn is_overload(&self) -> bool {
        matches!(self, Self::QueueOverflow { .. })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
