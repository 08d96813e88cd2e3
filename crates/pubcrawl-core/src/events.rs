use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;

/// Every state change a session action makes produces an Event.
/// The CLI prints them; a richer front end would turn unlocks into celebrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ParticipantRegistered {
        name: String,
        at: DateTime<Utc>,
    },
    StopCompleted {
        name: String,
        stop_index: usize,
        stop: String,
        points: u64,
        at: DateTime<Utc>,
    },
    /// Last stop on the route completed.
    RouteFinished {
        name: String,
        total_points: u64,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        name: String,
        achievement: Achievement,
        title: String,
        points: u64,
        at: DateTime<Utc>,
    },
    PunishmentAssigned {
        name: String,
        stop: String,
        punishment: String,
        at: DateTime<Utc>,
    },
    /// The ledger could not be read cleanly; data shown may be incomplete.
    StoreWarning {
        message: String,
        at: DateTime<Utc>,
    },
}
