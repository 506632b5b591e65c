//! Leaderboard read and score submission endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Deserialize;
use sws_common::events::LeaderboardEvent;
use sws_common::{NewScore, ScoreRecord};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::{ledger, AppState};

/// Query parameters for the high score list
#[derive(Debug, Deserialize)]
pub struct HighScoresQuery {
    /// Number of rows (1..=100)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// GET /api/scores?limit=N
///
/// Highest scores first.
pub async fn get_high_scores(
    State(state): State<AppState>,
    query: Result<Query<HighScoresQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ScoreRecord>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let records = ledger::top_scores(&state.db, query.limit).await?;
    Ok(Json(records))
}

/// POST /api/scores
///
/// Body: `{school, teacher, grade, score}`. Returns the stored record, which
/// carries the previous score when the submission did not beat it.
pub async fn add_score(
    State(state): State<AppState>,
    payload: Result<Json<NewScore>, JsonRejection>,
) -> ApiResult<Json<ScoreRecord>> {
    let Json(submission) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (record, outcome) = ledger::submit_score(&state.db, submission).await?;

    info!(
        "Score for {} / {} / {} grade: {:?}, stored {:.1} dB",
        record.school, record.teacher, record.grade, outcome, record.score
    );

    state.event_bus.emit_lossy(LeaderboardEvent::ScoreRecorded {
        record: record.clone(),
        outcome,
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(record))
}
