use std::sync::Arc;
use std::time::Duration;

use ecolesync::auth::{Credential, StaticCredentials};
use ecolesync::connectivity::ConnectivityMonitor;
use ecolesync::enqueuer::Dispatch;
use ecolesync::error::RpcError;
use ecolesync::processor::HaltReason;
use ecolesync::rpc::{HttpRpcClient, RpcClient};
use ecolesync::session::{SessionOptions, SyncSession};
use ecolesync::store::{MemoryQueueStore, StoreLimits};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::stub_rpc::{fast_replay, school_policy};

fn client(server: &MockServer) -> HttpRpcClient {
    HttpRpcClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn success_posts_data_envelope_with_bearer_token() {
    let server = MockServer::start().await;
    let payload = json!({"eleveId": "e1", "montant": 5000, "idempotencyKey": "k-1"});

    Mock::given(method("POST"))
        .and(path("/createPaiement"))
        .and(header("authorization", "Bearer fresh-token"))
        .and(body_json(json!({"data": payload.clone()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"id": "p-77"}})))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .call("createPaiement", &payload, &Credential::bearer("fresh-token"))
        .await
        .unwrap();

    assert_eq!(result, json!({"id": "p-77"}));
    server.verify().await;
}

#[tokio::test]
async fn already_exists_is_a_rejection_with_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createPaiement"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "status": "ALREADY_EXISTS",
                "message": "payment k-1 already recorded",
                "details": {"paiementId": "p-77"}
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .call("createPaiement", &json!({}), &Credential::bearer("t"))
        .await
        .unwrap_err();

    match err {
        RpcError::Rejected(rejection) => {
            assert_eq!(rejection.status, "ALREADY_EXISTS");
            assert_eq!(rejection.message, "payment k-1 already recorded");
            assert_eq!(rejection.details, Some(json!({"paiementId": "p-77"})));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn gateway_unavailable_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
        .mount(&server)
        .await;

    let err = client(&server)
        .call("toggleUserStatus", &json!({}), &Credential::bearer("t"))
        .await
        .unwrap_err();

    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn unauthenticated_is_distinct_from_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"status": "UNAUTHENTICATED", "message": "token expired"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .call("toggleUserStatus", &json!({}), &Credential::bearer("stale"))
        .await
        .unwrap_err();

    assert!(matches!(err, RpcError::Unauthorized { ref message } if message == "token expired"));
}

#[tokio::test]
async fn proxy_error_page_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .call("toggleUserStatus", &json!({}), &Credential::bearer("t"))
        .await
        .unwrap_err();

    match err {
        RpcError::Transport { message } => assert!(message.contains("boom")),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn internal_error_from_the_function_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"status": "INTERNAL", "message": "montant overflow"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .call("toggleUserStatus", &json!({}), &Credential::bearer("t"))
        .await
        .unwrap_err();

    match err {
        RpcError::Rejected(rejection) => {
            assert_eq!(rejection.status, "INTERNAL");
            assert_eq!(rejection.message, "montant overflow");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_transport() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client =
        HttpRpcClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();

    let err = client
        .call("toggleUserStatus", &json!({}), &Credential::bearer("t"))
        .await
        .unwrap_err();

    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn session_queues_on_unavailable_and_replays_when_server_returns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = SyncSession::init(
        SessionOptions {
            policy: school_policy(),
            replay: fast_replay(0),
            drain_on_startup: false,
        },
        Arc::new(MemoryQueueStore::new("prof-42", StoreLimits::default())),
        Arc::new(client(&server)),
        Arc::new(StaticCredentials::new("t")),
        ConnectivityMonitor::new(Some(false)),
    )
    .await
    .unwrap();

    let dispatch = session
        .attempt("toggleUserStatus", json!({"userId": "u1", "active": false}))
        .await
        .unwrap();
    assert!(matches!(dispatch, Dispatch::Queued(_)));

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/toggleUserStatus"))
        .and(body_json(json!({"data": {"userId": "u1", "active": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
        .expect(1)
        .mount(&server)
        .await;

    let report = session.drain().await.unwrap().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(session.observer().queue_length(), 0);
    session.dispose().await;
    server.verify().await;
}

#[tokio::test]
async fn throttled_replay_keeps_the_queued_command() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = SyncSession::init(
        SessionOptions {
            policy: school_policy(),
            replay: fast_replay(0),
            drain_on_startup: false,
        },
        Arc::new(MemoryQueueStore::new("prof-42", StoreLimits::default())),
        Arc::new(client(&server)),
        Arc::new(StaticCredentials::new("t")),
        ConnectivityMonitor::new(Some(false)),
    )
    .await
    .unwrap();

    let dispatch = session
        .attempt("toggleUserStatus", json!({"userId": "u1", "active": false}))
        .await
        .unwrap();
    assert!(matches!(dispatch, Dispatch::Queued(_)));

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/toggleUserStatus"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let report = session.drain().await.unwrap().unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.remaining, 1);
    assert!(matches!(report.halted, Some(HaltReason::Transport { .. })));
    assert_eq!(session.observer().queue_length(), 1);
    assert_eq!(session.pending().await.unwrap()[0].name, "toggleUserStatus");
    session.dispose().await;
}
