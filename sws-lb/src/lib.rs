//! sws-lb library - Sound Wave Science leaderboard service
//!
//! Keeps the highest loudness score per (school, teacher, grade) and serves
//! the ranked list over HTTP.

use axum::Router;
use sqlx::SqlitePool;
use sws_common::events::EventBus;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod ledger;
pub mod seed;

pub use crate::error::{ApiError, ApiResult};

/// Capacity of the leaderboard event channel per subscriber
pub const EVENT_BUS_CAPACITY: usize = 100;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Ledger database pool
    pub db: SqlitePool,
    /// Leaderboard change notifications for SSE subscribers
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let api = Router::new()
        .route("/api/scores", get(api::get_high_scores).post(api::add_score))
        .route("/api/events", get(api::event_stream))
        .route("/api/buildinfo", get(api::get_build_info));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Leaderboard pages may be served from another origin on the classroom network
        .layer(CorsLayer::permissive())
}
