//! sws-sm library - Sound Wave Science sound meter
//!
//! Measures how loud a class can be over a short window and records the
//! peak with the sws-lb leaderboard service.

pub mod analyser;
pub mod capture;
pub mod client;
pub mod countdown;
pub mod display;
pub mod error;
pub mod game;
pub mod level;
pub mod sampler;

pub use crate::error::{MeterError, Result};
