use std::sync::{Arc, Mutex};
use std::time::Duration;

use ecolesync::command::{CommandId, with_idempotency_key};
use ecolesync::connectivity::ConnectivityMonitor;
use ecolesync::enqueuer::Dispatch;
use ecolesync::error::DrainError;
use ecolesync::observer::QueueChange;
use ecolesync::processor::QueueProcessor;
use ecolesync::session::{SessionOptions, SyncSession};
use ecolesync::store::{MemoryQueueStore, QueueStore, StoreLimits};
use serde_json::json;

use crate::stub_rpc::{
    CountingCredentials, KEY_FIELD, StubBackend, already_exists, fast_replay, school_policy,
};

async fn offline_session(backend: &Arc<StubBackend>, transport_retries: u32) -> SyncSession {
    SyncSession::init(
        SessionOptions {
            policy: school_policy(),
            replay: fast_replay(transport_retries),
            drain_on_startup: false,
        },
        Arc::new(MemoryQueueStore::new("prof-42", StoreLimits::default())),
        backend.clone(),
        Arc::new(CountingCredentials::new()),
        ConnectivityMonitor::new(Some(false)),
    )
    .await
    .unwrap()
}

async fn enqueue_toggles(session: &SyncSession, count: usize) -> Vec<CommandId> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        match session
            .attempt("toggleUserStatus", json!({"userId": format!("u{n}"), "n": n}))
            .await
        {
            Ok(Dispatch::Queued(receipt)) => ids.push(receipt.id),
            other => panic!("expected queued, got {other:?}"),
        }
    }
    ids
}

#[tokio::test]
async fn commands_are_replayed_and_removed_in_enqueue_order() {
    let backend = Arc::new(StubBackend::down());
    let session = offline_session(&backend, 0).await;
    let ids = enqueue_toggles(&session, 20).await;

    let removed = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let removed = Arc::clone(&removed);
        session.observer().subscribe(move |change| {
            if let QueueChange::Removed { id, .. } = change {
                removed.lock().unwrap().push(id.clone());
            }
        })
    };

    backend.set_down(false);
    let report = session.drain().await.unwrap().unwrap();

    assert_eq!(report.processed, 20);
    assert_eq!(*removed.lock().unwrap(), ids);
    let replayed: Vec<u64> = backend
        .applied()
        .iter()
        .map(|(_, payload)| payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(replayed, (0..20).collect::<Vec<u64>>());
    session.dispose().await;
}

#[tokio::test]
async fn replaying_after_a_lost_response_applies_the_effect_once() {
    let backend = Arc::new(StubBackend::down());
    let session = offline_session(&backend, 1).await;
    let payload = with_idempotency_key(json!({"eleveId": "e1", "montant": 5000}), KEY_FIELD);
    let key = payload[KEY_FIELD].clone();
    assert!(matches!(
        session.attempt("createPaiement", payload).await,
        Ok(Dispatch::Queued(_))
    ));

    backend.set_down(false);
    backend.lose_next_response();
    let report = session.drain().await.unwrap().unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(backend.applied().len(), 1);
    let replays: Vec<_> = backend
        .seen()
        .into_iter()
        .filter(|seen| seen.name == "createPaiement")
        .map(|seen| seen.payload[KEY_FIELD].clone())
        .collect();
    // Enqueue attempt plus two replays, all carrying the same key.
    assert_eq!(replays, vec![key.clone(), key.clone(), key]);
    session.dispose().await;
}

#[tokio::test]
async fn queue_length_moves_by_one_and_never_goes_negative() {
    let backend = Arc::new(StubBackend::down());
    let session = offline_session(&backend, 0).await;

    let changes = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let changes = Arc::clone(&changes);
        session
            .observer()
            .subscribe(move |change| changes.lock().unwrap().push(change.clone()))
    };

    enqueue_toggles(&session, 5).await;
    backend.set_down(false);
    backend.script(Err(already_exists()));
    let report = session.drain().await.unwrap().unwrap();
    assert_eq!((report.processed, report.failed), (4, 1));

    let changes = changes.lock().unwrap();
    let mut previous = 0_i64;
    for change in changes.iter() {
        let length = i64::try_from(change.length()).unwrap();
        let expected = match change {
            QueueChange::Appended { .. } => previous + 1,
            QueueChange::Removed { .. } => previous - 1,
            QueueChange::AttemptRecorded { .. } => previous,
        };
        assert_eq!(length, expected, "after {change:?}");
        assert!(length >= 0);
        previous = length;
    }
    assert_eq!(previous, 0);
    assert_eq!(
        changes
            .iter()
            .filter(|c| matches!(c, QueueChange::Appended { .. }))
            .count(),
        5
    );
    session.dispose().await;
}

#[tokio::test]
async fn concurrent_drain_requests_never_overlap() {
    let backend = Arc::new(StubBackend::down());
    let session = offline_session(&backend, 0).await;
    enqueue_toggles(&session, 4).await;

    backend.set_down(false);
    backend.set_delay(Duration::from_millis(10));
    let (a, b, c) = tokio::join!(session.drain(), session.drain(), session.drain());

    let reports: Vec<_> = [a, b, c].into_iter().map(Result::unwrap).collect();
    let ran: Vec<_> = reports.iter().flatten().collect();
    assert_eq!(ran.len(), 1, "other requests are coalesced");
    assert_eq!(ran[0].processed, 4);
    assert_eq!(backend.max_in_flight(), 1);
    assert_eq!(backend.applied().len(), 4);
    session.dispose().await;
}

#[tokio::test]
async fn processor_rejects_a_second_concurrent_drain() {
    let backend = Arc::new(StubBackend::up());
    backend.set_delay(Duration::from_millis(10));
    let store = Arc::new(MemoryQueueStore::new("prof-42", StoreLimits::default()));
    for n in 0..3 {
        store
            .append(ecolesync::command::NewCommand::new(
                "toggleUserStatus",
                json!({"n": n}),
            ))
            .await
            .unwrap();
    }
    let processor = QueueProcessor::new(
        store.clone(),
        backend.clone(),
        Arc::new(CountingCredentials::new()),
        fast_replay(0),
    );

    let (first, second) = tokio::join!(processor.drain(), async {
        tokio::task::yield_now().await;
        processor.drain().await
    });

    assert_eq!(first.unwrap().processed, 3);
    assert!(matches!(second, Err(DrainError::AlreadyRunning)));
    assert_eq!(backend.max_in_flight(), 1);
    assert_eq!(store.len().await.unwrap(), 0);
}
