//! Score ledger: one row per (school, teacher, grade), keeping the highest score
//!
//! Every write goes through [`submit_score`]. It is a single conditional upsert
//! against the UNIQUE(school, teacher, grade) constraint, so two sessions
//! submitting for the same identity at the same moment can neither create a
//! duplicate row nor lower a stored score.

use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use sws_common::{Error, Grade, Identity, NewScore, Result, ScoreRecord, SubmitOutcome};
use tracing::debug;
use uuid::Uuid;

/// Upper bound for `top_scores`
pub const MAX_LIMIT: i64 = 100;

/// Raw `scores` row; ids and grades are stored as TEXT
#[derive(Debug, FromRow)]
struct ScoreRow {
    id: String,
    school: String,
    teacher: String,
    grade: String,
    score: f64,
}

impl TryFrom<ScoreRow> for ScoreRecord {
    type Error = Error;

    fn try_from(row: ScoreRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Internal(format!("corrupt score id '{}': {}", row.id, e)))?;
        let grade: Grade = row.grade.parse()?;

        Ok(ScoreRecord {
            id,
            school: row.school,
            teacher: row.teacher,
            grade,
            score: row.score,
        })
    }
}

/// Record a score, keeping only the maximum per identity
///
/// Creates the row on first submission, raises it when `score` is strictly
/// greater than the stored value, and otherwise leaves it untouched. The
/// stored record is returned in every case along with what happened.
pub async fn submit_score(
    pool: &SqlitePool,
    submission: NewScore,
) -> Result<(ScoreRecord, SubmitOutcome)> {
    let submission = submission.validated()?;
    let candidate_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    // The WHERE on DO UPDATE makes equal or lower scores a no-op (0 rows changed)
    let changed = sqlx::query(
        r#"
        INSERT INTO scores (id, school, teacher, grade, score)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (school, teacher, grade) DO UPDATE
            SET score = excluded.score,
                updated_at = CURRENT_TIMESTAMP
            WHERE excluded.score > scores.score
        "#,
    )
    .bind(candidate_id.to_string())
    .bind(&submission.school)
    .bind(&submission.teacher)
    .bind(submission.grade.as_str())
    .bind(submission.score)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let record = select_by_identity(&mut *tx, &submission.identity())
        .await?
        .ok_or_else(|| Error::Internal("score row missing after upsert".to_string()))?;

    tx.commit().await?;

    let outcome = if changed == 0 {
        SubmitOutcome::Unchanged
    } else if record.id == candidate_id {
        SubmitOutcome::Created
    } else {
        SubmitOutcome::Raised
    };

    debug!(
        "Score {:.1} for {} / {} / {}: {:?} (stored {:.1}, leaderboard changed: {})",
        submission.score,
        record.school,
        record.teacher,
        record.grade,
        outcome,
        record.score,
        outcome.changed()
    );

    Ok((record, outcome))
}

/// Highest scores first, at most `limit` rows (1..=100)
///
/// Ties keep insertion order.
pub async fn top_scores(pool: &SqlitePool, limit: i64) -> Result<Vec<ScoreRecord>> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(Error::InvalidInput(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )));
    }

    let rows: Vec<ScoreRow> = sqlx::query_as(
        r#"
        SELECT id, school, teacher, grade, score
        FROM scores
        ORDER BY score DESC, rowid ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ScoreRecord::try_from).collect()
}

/// Stored record for one identity, if any
pub async fn find_score(pool: &SqlitePool, identity: &Identity) -> Result<Option<ScoreRecord>> {
    select_by_identity(pool, identity).await
}

/// Number of identities on the leaderboard
pub async fn count_scores(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scores")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Shared by pool reads and the upsert transaction
async fn select_by_identity<'e, E>(executor: E, identity: &Identity) -> Result<Option<ScoreRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<ScoreRow> = sqlx::query_as(
        "SELECT id, school, teacher, grade, score FROM scores WHERE school = ? AND teacher = ? AND grade = ?",
    )
    .bind(&identity.school)
    .bind(&identity.teacher)
    .bind(identity.grade.as_str())
    .fetch_optional(executor)
    .await?;

    row.map(ScoreRecord::try_from).transpose()
}
