use std::sync::Arc;

use ecolesync::connectivity::ConnectivityMonitor;
use ecolesync::enqueuer::Dispatch;
use ecolesync::error::DispatchError;
use ecolesync::session::{SessionOptions, SyncSession};
use ecolesync::store::{QueueStore, SqliteQueueStore, StoreLimits};
use serde_json::json;
use tempfile::TempDir;

use crate::stub_rpc::{CountingCredentials, StubBackend, fast_replay, school_policy};

async fn session_over(
    store: Arc<SqliteQueueStore>,
    backend: Arc<StubBackend>,
    online: bool,
) -> SyncSession {
    SyncSession::init(
        SessionOptions {
            policy: school_policy(),
            replay: fast_replay(0),
            drain_on_startup: true,
        },
        store,
        backend,
        Arc::new(CountingCredentials::new()),
        ConnectivityMonitor::new(Some(online)),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn queued_commands_survive_restart_and_drain_on_startup() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("nested").join("queue.db");
    let backend = Arc::new(StubBackend::down());

    // First run: offline, one write queued.
    let store = Arc::new(
        SqliteQueueStore::open(&db, "prof-42", StoreLimits::default())
            .await
            .unwrap(),
    );
    let session = session_over(store.clone(), backend.clone(), false).await;
    let receipt = match session
        .attempt("toggleUserStatus", json!({"userId": "u1", "active": false}))
        .await
    {
        Ok(Dispatch::Queued(receipt)) => receipt,
        other => panic!("expected queued, got {other:?}"),
    };
    assert!(receipt.durable);
    session.dispose().await;
    store.close().await;

    // Second run: same file, still pending with the same id and payload.
    let store = Arc::new(
        SqliteQueueStore::open(&db, "prof-42", StoreLimits::default())
            .await
            .unwrap(),
    );
    let pending = store.list_all().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, receipt.id);
    assert_eq!(pending[0].payload, json!({"userId": "u1", "active": false}));

    // Opening online drains the leftovers.
    backend.set_down(false);
    let session = session_over(store.clone(), backend.clone(), true).await;
    let mut observer = session.observer().clone();
    while observer.queue_length() > 0 {
        observer.changed().await.unwrap();
    }
    session.dispose().await;
    store.close().await;

    let store = SqliteQueueStore::open(&db, "prof-42", StoreLimits::default())
        .await
        .unwrap();
    assert_eq!(store.len().await.unwrap(), 0);
    assert_eq!(backend.applied().len(), 1);
    store.close().await;
}

#[tokio::test]
async fn another_principal_on_the_same_device_sees_an_empty_queue() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("queue.db");
    let backend = Arc::new(StubBackend::down());

    let store = Arc::new(
        SqliteQueueStore::open(&db, "prof-42", StoreLimits::default())
            .await
            .unwrap(),
    );
    let session = session_over(store.clone(), backend.clone(), false).await;
    session
        .attempt("toggleUserStatus", json!({"userId": "u1"}))
        .await
        .unwrap();
    session.dispose().await;
    store.close().await;

    let other = Arc::new(
        SqliteQueueStore::open(&db, "parent-7", StoreLimits::default())
            .await
            .unwrap(),
    );
    backend.set_down(false);
    let session = session_over(other.clone(), backend.clone(), true).await;
    assert_eq!(session.observer().queue_length(), 0);
    assert!(session.pending().await.unwrap().is_empty());
    session.dispose().await;
    other.close().await;

    assert!(backend.applied().is_empty());
}

#[tokio::test]
async fn full_queue_refuses_the_write_instead_of_dropping_it() {
    let tmp = TempDir::new().unwrap();
    let limits = StoreLimits {
        max_payload_bytes: 64,
        max_total_bytes: 64,
    };
    let store = Arc::new(
        SqliteQueueStore::open(&tmp.path().join("queue.db"), "prof-42", limits)
            .await
            .unwrap(),
    );
    let session = session_over(store.clone(), Arc::new(StubBackend::down()), false).await;

    let first = session
        .attempt("toggleUserStatus", json!({"userId": "u-0001"}))
        .await;
    assert!(matches!(first, Ok(Dispatch::Queued(_))));

    let second = session
        .attempt("toggleUserStatus", json!({"userId": "u-0002", "note": "x".repeat(40)}))
        .await;
    assert!(matches!(second, Err(DispatchError::Capacity(_))), "got {second:?}");
    assert_eq!(session.observer().queue_length(), 1);

    session.dispose().await;
    store.close().await;
}
