//! Shared test doubles for scheduler integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use report_admission::config::QueueConfig;
use report_admission::core::{
    AdmissionQueue, AnalysisClient, QueueSnapshot, ReportErrorKind, ReportStore, SchedulerError,
};
use report_admission::infra::InMemoryReportStore;
use report_admission::util::ReportId;
use serde_json::{json, Value};

pub type TestQueue = AdmissionQueue<Value, InMemoryReportStore<Value>, ScriptedClient>;

pub fn payload(id: &str) -> Value {
    json!({ "id": id, "input": { "scan": { "id": format!("scan-{id}") } } })
}

fn payload_id(payload: &Value) -> String {
    payload["id"].as_str().unwrap_or_default().to_string()
}

/// Analysis client that records submissions and fails or hangs on demand.
#[derive(Default)]
pub struct ScriptedClient {
    submitted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn hang_on(&self, id: &str) {
        self.hanging.lock().insert(id.to_string());
    }

    pub fn panic_on(&self, id: &str) {
        self.panicking.lock().insert(id.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Ids accepted downstream, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl AnalysisClient<Value> for ScriptedClient {
    async fn submit(&self, payload: &Value) -> Result<(), SchedulerError> {
        let id = payload_id(payload);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.hanging.lock().contains(&id) {
            std::future::pending::<()>().await;
        }
        assert!(!self.panicking.lock().contains(&id), "client blew up on {id}");
        if self.failing.lock().contains(&id) {
            return Err(SchedulerError::Submission(format!("503 Service Unavailable for {id}")));
        }
        self.submitted.lock().push(id);
        Ok(())
    }
}

/// Store wrapper whose reads and error writes fail, or panic, for selected ids.
pub struct FlakyStore {
    pub inner: InMemoryReportStore<Value>,
    broken: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryReportStore::new(),
            broken: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
        }
    }

    pub fn break_writes_for(&self, id: &str) {
        self.broken.lock().insert(id.to_string());
    }

    /// `mark_error` panics for `id` instead of returning an error.
    pub fn panic_on_error_write(&self, id: &str) {
        self.panicking.lock().insert(id.to_string());
    }
}

#[async_trait]
impl ReportStore<Value> for FlakyStore {
    async fn find_by_id(&self, id: &ReportId) -> Result<Option<Value>, SchedulerError> {
        if self.broken.lock().contains(id.as_str()) {
            return Err(SchedulerError::Store(format!("corrupt document {id}")));
        }
        self.inner.find_by_id(id).await
    }

    async fn mark_sent(&self, id: &ReportId) -> Result<(), SchedulerError> {
        self.inner.mark_sent(id).await
    }

    async fn mark_error(
        &self,
        id: &ReportId,
        kind: ReportErrorKind,
        message: &str,
    ) -> Result<(), SchedulerError> {
        let panics = self.panicking.lock().contains(id.as_str());
        assert!(!panics, "store blew up writing {id}");
        if self.broken.lock().contains(id.as_str()) {
            return Err(SchedulerError::Store("write concern failed".into()));
        }
        self.inner.mark_error(id, kind, message).await
    }
}

/// Queue over an in-memory store pre-populated with `ids`.
pub fn queue_with(
    config: QueueConfig,
    ids: &[&str],
) -> (TestQueue, Arc<InMemoryReportStore<Value>>, Arc<ScriptedClient>) {
    let store = Arc::new(InMemoryReportStore::new());
    for id in ids {
        store.insert(*id, payload(id));
    }
    let client = Arc::new(ScriptedClient::new());
    let queue = AdmissionQueue::new(config, Arc::clone(&store), Arc::clone(&client)).unwrap();
    (queue, store, client)
}

pub fn ids(list: &[&str]) -> Vec<ReportId> {
    list.iter().map(|id| ReportId::from(*id)).collect()
}

/// Capacity and disjointness checks that must hold between operations.
pub fn assert_invariants(snapshot: &QueueSnapshot) {
    assert!(
        snapshot.active.len() + snapshot.dispatching <= snapshot.max_active,
        "too many active: {snapshot:?}"
    );
    assert!(snapshot.pending.len() <= snapshot.max_size, "pending overflow: {snapshot:?}");
    let mut seen = HashSet::new();
    for id in snapshot.pending.iter().chain(snapshot.active.iter()) {
        assert!(seen.insert(id.clone()), "{id} tracked twice: {snapshot:?}");
    }
}
