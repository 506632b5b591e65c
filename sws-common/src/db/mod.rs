//! Database initialization shared by the leaderboard service and its tests

pub mod init;

pub use init::*;
