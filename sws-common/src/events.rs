//! Leaderboard events and the broadcast bus that carries them
//!
//! The ledger emits an event after every accepted submission so that
//! connected leaderboard viewers know to refresh their top-N read.

use crate::models::{ScoreRecord, SubmitOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events broadcast by the leaderboard service
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LeaderboardEvent {
    /// A submission was processed
    ///
    /// Emitted for unchanged submissions too; viewers only need to refresh
    /// when `outcome` reports a change.
    ScoreRecorded {
        record: ScoreRecord,
        outcome: SubmitOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LeaderboardEvent {
    /// SSE event name
    pub fn event_type(&self) -> &str {
        match self {
            LeaderboardEvent::ScoreRecorded { .. } => "ScoreRecorded",
        }
    }
}

/// Broadcast bus for leaderboard events
///
/// Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LeaderboardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    ///
    /// ```
    /// use sws_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the case where nobody is listening
    pub fn emit_lossy(&self, event: LeaderboardEvent) {
        let _ = self.tx.send(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
