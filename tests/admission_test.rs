//! Admission queue behaviour: immediate dispatch, queueing, overflow,
//! submission failures, FIFO promotion and removal notices.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{assert_invariants, ids, payload, queue_with};
use rand::Rng;
use report_admission::builders::SchedulerBuilder;
use report_admission::config::QueueConfig;
use report_admission::core::{
    Admission, AdmissionQueue, DispatchOutcome, InMemoryEventSink, ReportErrorKind,
    SchedulerError, Transition,
};
use report_admission::infra::store::ReportStatus;
use report_admission::util::ReportId;

fn config(max_active: usize, max_size: usize) -> QueueConfig {
    QueueConfig::default()
        .with_max_active(max_active)
        .with_max_size(max_size)
}

fn sent() -> Admission {
    Admission::Dispatched {
        outcome: DispatchOutcome::Sent,
    }
}

#[tokio::test]
async fn test_immediate_dispatch_marks_sent() {
    let (queue, store, client) = queue_with(config(2, 10), &["a"]);

    let admission = queue.admit("a".into(), payload("a")).await.unwrap();

    assert_eq!(admission, sent());
    assert!(queue.is_active(&"a".into()));
    assert_eq!(client.submitted(), vec!["a"]);
    assert_eq!(store.status(&"a".into()), Some(ReportStatus::Sent));
}

#[tokio::test]
async fn test_overflow_rejects_and_keeps_pending() {
    let (queue, _store, client) = queue_with(config(1, 1), &["a", "b", "c"]);

    assert_eq!(queue.admit("a".into(), payload("a")).await.unwrap(), sent());
    assert_eq!(
        queue.admit("b".into(), payload("b")).await.unwrap(),
        Admission::Queued { position: 1 }
    );

    let err = queue.admit("c".into(), payload("c")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::QueueOverflow { max_size: 1 }));
    assert!(err.is_overload());

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.pending, ids(&["b"]));
    assert_eq!(snapshot.active, ids(&["a"]));
    assert_eq!(client.submitted(), vec!["a"]);
}

#[tokio::test]
async fn test_submission_failure_consumes_no_slot() {
    let (queue, store, client) = queue_with(config(2, 10), &["x", "y", "z"]);
    client.fail_on("x");

    let admission = queue.admit("x".into(), payload("x")).await.unwrap();
    match admission {
        Admission::Dispatched {
            outcome: DispatchOutcome::SubmissionFailed(message),
        } => assert!(message.contains("503")),
        other => panic!("unexpected admission {other:?}"),
    }
    assert!(!queue.is_active(&"x".into()));

    let record = store.record(&"x".into()).unwrap();
    assert_eq!(record.error.unwrap().kind, ReportErrorKind::SubmissionFailed);
    assert_eq!(store.status(&"x".into()), Some(ReportStatus::Failed));

    // Both slots are still available.
    assert_eq!(queue.admit("y".into(), payload("y")).await.unwrap(), sent());
    assert_eq!(queue.admit("z".into(), payload("z")).await.unwrap(), sent());
    assert_eq!(queue.snapshot().active, ids(&["y", "z"]));
}

#[tokio::test]
async fn test_pending_promoted_in_fifo_order() {
    let all = ["a", "b", "c", "d", "e"];
    let (queue, _store, client) = queue_with(config(2, 10), &all);
    for id in all {
        queue.admit(id.into(), payload(id)).await.unwrap();
    }
    assert_eq!(queue.snapshot().pending, ids(&["c", "d", "e"]));

    assert!(queue.received(&"a".into()));
    assert!(queue.received(&"b".into()));
    let summary = queue.backfill().await;

    assert_eq!(summary.dispatched, 2);
    assert_eq!(client.submitted(), vec!["a", "b", "c", "d"]);
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.active, ids(&["c", "d"]));
    assert_eq!(snapshot.pending, ids(&["e"]));
}

#[tokio::test]
async fn test_received_is_idempotent() {
    let (queue, _store, _client) = queue_with(config(1, 10), &["a", "b"]);
    queue.admit("a".into(), payload("a")).await.unwrap();
    queue.admit("b".into(), payload("b")).await.unwrap();

    assert!(queue.received(&"a".into()));
    assert!(!queue.received(&"a".into()));
    assert!(!queue.received(&"unknown".into()));
    // A completion notice never touches the pending buffer.
    assert!(!queue.received(&"b".into()));
    assert_eq!(queue.snapshot().pending, ids(&["b"]));
}

#[tokio::test]
async fn test_deleted_removes_from_both_sets() {
    let (queue, _store, _client) = queue_with(config(1, 10), &["a", "b", "c"]);
    for id in ["a", "b", "c"] {
        queue.admit(id.into(), payload(id)).await.unwrap();
    }

    assert!(queue.deleted(&"b".into()));
    assert!(!queue.deleted(&"b".into()));
    assert_eq!(queue.snapshot().pending, ids(&["c"]));

    let targets = ids(&["a", "c", "missing"]);
    assert_eq!(queue.deleted_many(&targets), 2);
    let snapshot = queue.snapshot();
    assert!(snapshot.active.is_empty());
    assert!(snapshot.pending.is_empty());
}

#[tokio::test]
async fn test_readmission_is_a_noop() {
    let (queue, _store, client) = queue_with(config(1, 10), &["a", "b", "c"]);
    queue.admit("a".into(), payload("a")).await.unwrap();
    queue.admit("b".into(), payload("b")).await.unwrap();
    queue.admit("c".into(), payload("c")).await.unwrap();

    assert_eq!(
        queue.admit("a".into(), payload("a")).await.unwrap(),
        Admission::AlreadyTracked
    );
    assert_eq!(
        queue.admit("b".into(), payload("b")).await.unwrap(),
        Admission::AlreadyTracked
    );
    assert_eq!(queue.snapshot().pending, ids(&["b", "c"]));
    assert_eq!(client.submitted(), vec!["a"]);
}

#[tokio::test]
async fn test_backfill_skips_missing_and_failed_reports() {
    let (queue, store, client) = queue_with(config(1, 10), &["a", "b", "c", "d"]);
    client.fail_on("c");
    for id in ["a", "b", "c", "d"] {
        queue.admit(id.into(), payload(id)).await.unwrap();
    }
    // "b" was deleted from the store without a deletion notice.
    store.remove(&"b".into());

    queue.received(&"a".into());
    let summary = queue.backfill().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(queue.snapshot().active, ids(&["d"]));
    assert_eq!(store.status(&"c".into()), Some(ReportStatus::Failed));
    assert_eq!(client.submitted(), vec!["a", "d"]);
}

#[tokio::test]
async fn test_cancelled_admission_releases_reservation() {
    let (queue, _store, client) = queue_with(config(1, 10), &["stuck", "next"]);
    client.hang_on("stuck");

    let attempt = tokio::time::timeout(
        Duration::from_millis(20),
        queue.admit("stuck".into(), payload("stuck")),
    )
    .await;
    assert!(attempt.is_err());

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.dispatching, 0);
    assert!(snapshot.active.is_empty());
    assert_eq!(queue.admit("next".into(), payload("next")).await.unwrap(), sent());
}

#[tokio::test]
async fn test_deleted_during_submission_does_not_occupy_slot() {
    let (queue, store, client) = queue_with(config(1, 10), &["slow"]);
    client.set_delay(Duration::from_millis(50));
    let queue = Arc::new(queue);

    let admitting = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.admit("slow".into(), payload("slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(queue.snapshot().dispatching, 1);
    assert!(queue.deleted(&"slow".into()));

    let admission = admitting.await.unwrap().unwrap();
    assert_eq!(
        admission,
        Admission::Dispatched {
            outcome: DispatchOutcome::Skipped
        }
    );
    assert!(queue.snapshot().active.is_empty());
    assert_eq!(store.status(&"slow".into()), Some(ReportStatus::Unknown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_respect_limits() {
    let names: Vec<String> = (0..20).map(|i| format!("r{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (queue, _store, client) = queue_with(config(3, 5), &refs);
    client.set_delay(Duration::from_millis(5));
    let queue = Arc::new(queue);

    let handles: Vec<_> = names
        .iter()
        .cloned()
        .map(|id| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.admit(ReportId::from(id.as_str()), payload(&id)).await })
        })
        .collect();
    let results = futures::future::join_all(handles).await;

    let mut dispatched = 0;
    let mut queued = 0;
    let mut rejected = 0;
    for result in results {
        match result.unwrap() {
            Ok(Admission::Dispatched { .. }) => dispatched += 1,
            Ok(Admission::Queued { .. }) => queued += 1,
            Ok(Admission::AlreadyTracked) => panic!("ids are unique"),
            Err(SchedulerError::QueueOverflow { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    assert_eq!(dispatched, 3);
    assert_eq!(queued, 5);
    assert_eq!(rejected, 12);
    let snapshot = queue.snapshot();
    assert_invariants(&snapshot);
    assert_eq!(snapshot.active.len(), 3);
    assert_eq!(snapshot.pending.len(), 5);
}

#[tokio::test]
async fn test_random_operations_preserve_invariants() {
    let names: Vec<String> = (0..12).map(|i| format!("r{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (queue, _store, client) = queue_with(config(3, 4), &refs);
    client.fail_on("r7");
    let mut rng = rand::rng();

    for _ in 0..500 {
        let id = names[rng.random_range(0..names.len())].clone();
        match rng.random_range(0..4) {
            0 | 1 => {
                let _ = queue.admit(id.as_str().into(), payload(&id)).await;
            }
            2 => {
                queue.received(&id.as_str().into());
            }
            _ => {
                if rng.random_bool(0.5) {
                    queue.deleted(&id.as_str().into());
                } else {
                    queue.backfill().await;
                }
            }
        }
        let snapshot = queue.snapshot();
        assert_invariants(&snapshot);
        assert_eq!(snapshot.dispatching, 0);
        assert!(!snapshot.active.contains(&"r7".into()));
    }
}

#[tokio::test]
async fn test_scheduler_received_backfills_eagerly() {
    let store = Arc::new(report_admission::infra::InMemoryReportStore::new());
    for id in ["a", "b"] {
        store.insert(id, payload(id));
    }
    let client = Arc::new(common::ScriptedClient::new());
    let events = Arc::new(InMemoryEventSink::new(64));
    let scheduler = SchedulerBuilder::new(config(1, 10).with_sweep_interval(Duration::from_secs(3600)))
        .with_events(events.clone())
        .start(Arc::clone(&store), Arc::clone(&client))
        .unwrap();

    scheduler.admit("a".into(), payload("a")).await.unwrap();
    scheduler.admit("b".into(), payload("b")).await.unwrap();
    assert_eq!(scheduler.snapshot().pending, ids(&["b"]));

    scheduler.received(&"a".into()).await;

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.active, ids(&["b"]));
    assert!(snapshot.pending.is_empty());
    assert_eq!(
        events.transitions_for(&"a".into()),
        vec![Transition::Sent, Transition::Received]
    );
    assert_eq!(
        events.transitions_for(&"b".into()),
        vec![Transition::Queued, Transition::Sent]
    );
    scheduler.shutdown().await;
}

#[test]
fn test_invalid_config_is_rejected() {
    let store = Arc::new(report_admission::infra::InMemoryReportStore::<serde_json::Value>::new());
    let client = Arc::new(common::ScriptedClient::new());
    let result = AdmissionQueue::new(config(0, 10), store, client);
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
