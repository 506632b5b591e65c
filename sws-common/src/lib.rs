//! # Sound Wave Science Common Library
//!
//! Shared code for the leaderboard service (sws-lb) and the sound meter (sws-sm):
//! - Score, grade and identity types
//! - Leaderboard events and the broadcast bus
//! - Configuration loading and root folder resolution
//! - Database initialization
//! - SSE helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
pub use models::{Grade, Identity, NewScore, ScoreRecord, SubmitOutcome};
