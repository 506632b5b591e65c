//! Integration tests for sws-lb API endpoints
//!
//! Tests cover:
//! - Health and build info endpoints
//! - GET /api/scores ordering, limit bounds
//! - POST /api/scores max-retention semantics and validation
//! - Leaderboard events emitted on submission

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sws_common::db::init_database;
use sws_common::events::{EventBus, LeaderboardEvent};
use sws_common::SubmitOutcome;
use sws_lb::{build_router, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: fresh on-disk database and app state
async fn setup_state() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("sws.db"))
        .await
        .expect("Should create test database");
    (dir, AppState::new(pool, EventBus::new(16)))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.expect("Should read body").to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn score_body(school: &str, teacher: &str, grade: &str, score: f64) -> Value {
    json!({ "school": school, "teacher": teacher, "grade": grade, "score": score })
}

// =============================================================================
// Health / build info
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sws-lb");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_build_info_endpoint() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/api/buildinfo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["git_hash"].is_string());
    assert!(body["build_profile"].is_string());
}

// =============================================================================
// Score submission
// =============================================================================

#[tokio::test]
async fn test_add_score_keeps_maximum_and_id() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let first = app
        .clone()
        .oneshot(post_json("/api/scores", score_body("School of Rock", "Mr. Brown", "1st", 10.1)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = extract_json(first.into_body()).await;
    assert_eq!(first["score"], 10.1);
    assert_eq!(first["grade"], "1st");

    let lower = app
        .clone()
        .oneshot(post_json("/api/scores", score_body("School of Rock", "Mr. Brown", "1st", 8.0)))
        .await
        .unwrap();
    let lower = extract_json(lower.into_body()).await;
    assert_eq!(lower["score"], 10.1);
    assert_eq!(lower["id"], first["id"]);

    let higher = app
        .clone()
        .oneshot(post_json("/api/scores", score_body("School of Rock", "Mr. Brown", "1st", 12.0)))
        .await
        .unwrap();
    let higher = extract_json(higher.into_body()).await;
    assert_eq!(higher["score"], 12.0);
    assert_eq!(higher["id"], first["id"]);

    let list = app.oneshot(get("/api/scores?limit=10")).await.unwrap();
    let list = extract_json(list.into_body()).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_score_rejects_non_positive_score() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/api/scores", score_body("School of Rock", "Mr. Brown", "1st", 0.0)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_add_score_rejects_unknown_grade() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/api/scores", score_body("School of Rock", "Mr. Brown", "6th", 9.0)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_score_rejects_blank_teacher() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/api/scores", score_body("School of Rock", "   ", "2nd", 9.0)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_score_emits_leaderboard_event() {
    let (_dir, state) = setup_state().await;
    let mut events = state.event_bus.subscribe();
    let app = build_router(state);

    app.clone()
        .oneshot(post_json("/api/scores", score_body("School of Jazz", "Mr. Davis", "3rd", 10.2)))
        .await
        .unwrap();
    app.oneshot(post_json("/api/scores", score_body("School of Jazz", "Mr. Davis", "3rd", 9.9)))
        .await
        .unwrap();

    let LeaderboardEvent::ScoreRecorded { outcome, record, .. } = events.recv().await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Created);
    assert_eq!(record.score, 10.2);

    let LeaderboardEvent::ScoreRecorded { outcome, record, .. } = events.recv().await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Unchanged);
    assert_eq!(record.score, 10.2);
}

// =============================================================================
// High score list
// =============================================================================

#[tokio::test]
async fn test_high_scores_sorted_and_limited() {
    let (_dir, state) = setup_state().await;
    sws_lb::seed::seed_demo_scores(&state.db).await.unwrap();
    let app = build_router(state);

    let response = app.oneshot(get("/api/scores?limit=3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);

    let scores: Vec<f64> = rows.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert_eq!(scores, vec![12.1, 12.0, 11.6]);
    for row in rows {
        assert!(row["id"].is_string());
        assert!(row["school"].is_string());
        assert!(row["teacher"].is_string());
        assert!(row["grade"].is_string());
    }
}

#[tokio::test]
async fn test_high_scores_default_limit_is_ten() {
    let (_dir, state) = setup_state().await;
    sws_lb::seed::seed_demo_scores(&state.db).await.unwrap();
    sws_lb::ledger::submit_score(
        &state.db,
        sws_common::NewScore {
            school: "School of Funk".to_string(),
            teacher: "Ms. Franklin".to_string(),
            grade: sws_common::Grade::Fifth,
            score: 9.5,
        },
    )
    .await
    .unwrap();
    let app = build_router(state);

    let response = app.oneshot(get("/api/scores")).await.unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_high_scores_limit_bounds() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    for uri in ["/api/scores?limit=0", "/api/scores?limit=101", "/api/scores?limit=-5"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    let response = app.oneshot(get("/api/scores?limit=100")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_high_scores_malformed_limit_gets_json_error() {
    let (_dir, state) = setup_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/api/scores?limit=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}
