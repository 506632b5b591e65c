//! LedgerClient against a running sws-lb service

use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use sws_common::db::init_database;
use sws_common::events::EventBus;
use sws_common::{Grade, Identity, NewScore};
use sws_lb::{build_router, AppState};
use sws_sm::client::LedgerClient;
use sws_sm::MeterError;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_ledger() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("sws.db")).await.unwrap();
    let url = serve(build_router(AppState::new(pool, EventBus::new(16)))).await;
    (dir, url)
}

#[tokio::test]
async fn test_submit_and_list_scores() {
    let (_dir, url) = spawn_ledger().await;
    let client = LedgerClient::new(&url).unwrap();
    let identity = Identity::new("School of Rock", "Mr. Brown", Grade::First);

    let first = client.add_score(&NewScore::new(&identity, 10.1)).await.unwrap();
    assert_eq!(first.score, 10.1);

    let lower = client.add_score(&NewScore::new(&identity, 8.0)).await.unwrap();
    assert_eq!(lower.id, first.id);
    assert_eq!(lower.score, 10.1);

    client
        .add_score(&NewScore::new(
            &Identity::new("School of Jazz", "Mr. Davis", Grade::Third),
            11.6,
        ))
        .await
        .unwrap();

    let scores = client.high_scores(10).await.unwrap();
    let listed: Vec<f64> = scores.iter().map(|r| r.score).collect();
    assert_eq!(listed, vec![11.6, 10.1]);
}

#[tokio::test]
async fn test_rejected_submission_carries_ledger_message() {
    let (_dir, url) = spawn_ledger().await;
    let client = LedgerClient::new(&url).unwrap();
    let identity = Identity::new("School of Rock", "Mr. Brown", Grade::First);

    let err = client
        .add_score(&NewScore::new(&identity, 0.0))
        .await
        .unwrap_err();

    match &err {
        MeterError::Ledger { status, message } => {
            assert_eq!(*status, 400);
            assert!(message.contains("score"), "{}", message);
        }
        other => panic!("expected ledger error, got {:?}", other),
    }
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_out_of_range_limit_is_rejected() {
    let (_dir, url) = spawn_ledger().await;
    let client = LedgerClient::new(&url).unwrap();

    let err = client.high_scores(500).await.unwrap_err();
    assert!(matches!(err, MeterError::Ledger { status: 400, .. }));
}

#[tokio::test]
async fn test_server_failure_is_retryable() {
    let app = Router::new().route(
        "/api/scores",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"code": "STORAGE_ERROR", "message": "disk full"}})),
            )
        }),
    );
    let client = LedgerClient::new(&serve(app).await).unwrap();

    let err = client.high_scores(10).await.unwrap_err();
    assert!(matches!(err, MeterError::Ledger { status: 500, ref message } if message == "disk full"));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_unreachable_ledger_is_transport_error() {
    // Bind then release a port so nothing is listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LedgerClient::new(&format!("http://{}", addr)).unwrap();
    let err = client.high_scores(10).await.unwrap_err();
    assert!(matches!(err, MeterError::Http(_)));
    assert!(err.is_transport());
}
