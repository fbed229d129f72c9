//! HTTP client for the downstream analysis service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::{AnalysisClient, SchedulerError};
use crate::util::ReportPayload;

/// Posts report payloads as JSON to the analysis service.
///
/// When a JSON pointer is set (e.g. `/input`), only that section of the
/// payload is sent.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    pointer: Option<String>,
}

impl HttpAnalysisClient {
    /// Client posting whole payloads to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            pointer: None,
        }
    }

    /// Client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn with_request_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SchedulerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            pointer: None,
        })
    }

    /// Only send the payload section at `pointer`.
    #[must_use]
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    /// Target URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn body<P: Serialize>(&self, payload: &P) -> Result<Value, SchedulerError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| SchedulerError::Submission(format!("unable to encode payload: {e}")))?;
        match &self.pointer {
            None => Ok(value),
            Some(pointer) => value.pointer(pointer).cloned().ok_or_else(|| {
                SchedulerError::Submission(format!("payload has no `{pointer}` section"))
            }),
        }
    }
}

#[async_trait]
impl<P: ReportPayload> AnalysisClient<P> for HttpAnalysisClient {
    async fn submit(&self, payload: &P) -> Result<(), SchedulerError> {
        let body = self.body(payload)?;
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SchedulerError::Submission(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = %self.endpoint, %status, "analysis service accepted payload");
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(SchedulerError::Submission(format!(
            "analysis service returned {status}: {detail}"
        )))
    }
}
