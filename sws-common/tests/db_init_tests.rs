//! Database initialization: creation, reopening, schema constraints

use sws_common::db::init::{init_database, SCHEMA_VERSION};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sub").join("sws.db");

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sws.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO scores (id, school, teacher, grade, score) VALUES ('a', 'S', 'T', '1st', 1.0)")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scores")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "existing rows must survive re-initialization");

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_scores_table_enforces_unique_identity() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("sws.db")).await.unwrap();

    sqlx::query("INSERT INTO scores (id, school, teacher, grade, score) VALUES ('a', 'S', 'T', '2nd', 5.0)")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query("INSERT INTO scores (id, school, teacher, grade, score) VALUES ('b', 'S', 'T', '2nd', 6.0)")
        .execute(&pool)
        .await;

    assert!(duplicate.is_err(), "second row for the same triple must be rejected");
}

#[tokio::test]
async fn test_scores_table_rejects_bad_grade_and_score() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("sws.db")).await.unwrap();

    let bad_grade = sqlx::query("INSERT INTO scores (id, school, teacher, grade, score) VALUES ('a', 'S', 'T', '6th', 5.0)")
        .execute(&pool)
        .await;
    assert!(bad_grade.is_err());

    let bad_score = sqlx::query("INSERT INTO scores (id, school, teacher, grade, score) VALUES ('b', 'S', 'T', '1st', 0.0)")
        .execute(&pool)
        .await;
    assert!(bad_score.is_err());
}
