//! HTTP API handlers for sws-lb

pub mod buildinfo;
pub mod health;
pub mod scores;
pub mod sse;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use scores::{add_score, get_high_scores};
pub use sse::event_stream;
