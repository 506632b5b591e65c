//! HTTP client for the sws-lb leaderboard service

use serde::Deserialize;
use std::time::Duration;
use sws_common::{NewScore, ScoreRecord};

use crate::error::{MeterError, Result};

const USER_AGENT: &str = concat!("sws-sm/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Leaderboard service client
#[derive(Clone)]
pub struct LedgerClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl LedgerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Highest scores first, at most `limit` rows
    pub async fn high_scores(&self, limit: i64) -> Result<Vec<ScoreRecord>> {
        tracing::debug!(limit, "Fetching high scores");

        let response = self
            .http_client
            .get(format!("{}/api/scores", self.base_url))
            .query(&[("limit", limit)])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Submit a score; the returned record holds whatever the ledger kept
    pub async fn add_score(&self, submission: &NewScore) -> Result<ScoreRecord> {
        tracing::debug!(
            school = %submission.school,
            teacher = %submission.teacher,
            grade = %submission.grade,
            score = submission.score,
            "Submitting score"
        );

        let response = self
            .http_client
            .post(format!("{}/api/scores", self.base_url))
            .json(submission)
            .send()
            .await?;

        let record: ScoreRecord = check_status(response).await?.json().await?;
        tracing::info!(id = %record.id, stored = record.score, "Score accepted");
        Ok(record)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or(text);

    Err(MeterError::Ledger {
        status: status.as_u16(),
        message,
    })
}
