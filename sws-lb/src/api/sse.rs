//! Server-Sent Events for leaderboard refresh

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events - leaderboard change notifications
///
/// Streams:
/// - ConnectionStatus (once, on connect)
/// - ScoreRecorded (after every processed submission)
/// - Resync (subscriber fell behind; re-read the leaderboard)
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sws_common::sse::leaderboard_event_stream(&state.event_bus, "sws-lb")
}
