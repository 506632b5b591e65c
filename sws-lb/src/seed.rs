//! Demo leaderboard rows for a fresh installation

use sqlx::SqlitePool;
use sws_common::{Grade, Result};
use tracing::info;
use uuid::Uuid;

/// (school, teacher, grade, score)
pub const DEMO_SCORES: [(&str, &str, Grade, f64); 10] = [
    ("School of Rock", "Mr. Brown", Grade::First, 10.1),
    ("School of Rock", "Mr. Brown", Grade::Second, 11.2),
    ("School of Rock", "Ms. Smith", Grade::Second, 10.9),
    ("School of Rock", "Ms. Smith", Grade::Fourth, 11.5),
    ("School of Rock", "Ms. Smith", Grade::Third, 11.6),
    ("School of Jazz", "Mr. Davis", Grade::Third, 10.2),
    ("School of Jazz", "Ms. Williams", Grade::Fifth, 10.0),
    ("School of Jazz", "Ms. Willians", Grade::First, 12.0),
    ("School of Jazz", "Mr. Davis", Grade::Fourth, 11.3),
    ("School of Jazz", "Ms. Williams", Grade::Second, 12.1),
];

/// Insert the demo rows that are not present yet
///
/// Existing rows are left exactly as they are, so seeding an active
/// leaderboard never changes a real score. Returns the number of rows added.
pub async fn seed_demo_scores(pool: &SqlitePool) -> Result<u64> {
    let mut inserted = 0;

    for (school, teacher, grade, score) in DEMO_SCORES {
        inserted += sqlx::query(
            r#"
            INSERT INTO scores (id, school, teacher, grade, score)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (school, teacher, grade) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(school)
        .bind(teacher)
        .bind(grade.as_str())
        .bind(score)
        .execute(pool)
        .await?
        .rows_affected();
    }

    info!("Seeded {} demo scores", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{count_scores, find_score, submit_score};
    use sws_common::db::init_database;
    use sws_common::{Identity, NewScore};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("sws.db")).await.unwrap();

        assert_eq!(seed_demo_scores(&pool).await.unwrap(), 10);
        assert_eq!(seed_demo_scores(&pool).await.unwrap(), 0);
        assert_eq!(count_scores(&pool).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_seed_never_overwrites_real_scores() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("sws.db")).await.unwrap();
        let identity = Identity::new("School of Rock", "Mr. Brown", Grade::First);
        submit_score(&pool, NewScore::new(&identity, 42.0)).await.unwrap();

        assert_eq!(seed_demo_scores(&pool).await.unwrap(), 9);

        let stored = find_score(&pool, &identity).await.unwrap().unwrap();
        assert_eq!(stored.score, 42.0);
    }
}
