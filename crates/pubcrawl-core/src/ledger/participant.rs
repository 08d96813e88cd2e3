use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;
use crate::error::ValidationError;

/// One registered player and their progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Index of the stop being worked on; equals the route length once finished.
    pub current_stop: usize,
    /// Names of completed stops, in completion order.
    pub completed_stops: Vec<String>,
    pub points: u64,
    pub achievements: BTreeSet<Achievement>,
    pub start_time: DateTime<Utc>,
}

impl Participant {
    pub fn new(name: &str, start_time: DateTime<Utc>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: normalize_name(name)?,
            current_stop: 0,
            completed_stops: Vec::new(),
            points: 0,
            achievements: BTreeSet::new(),
            start_time,
        })
    }

    pub fn completed_count(&self) -> usize {
        self.completed_stops.len()
    }

    pub fn has(&self, achievement: Achievement) -> bool {
        self.achievements.contains(&achievement)
    }
}

/// Trim a display name and reject empty ones.
pub fn normalize_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// The Participants table, one row per unique name, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantTable {
    rows: Vec<Participant>,
}

impl ParticipantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Participant>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.upsert(row);
        }
        table
    }

    pub fn rows(&self) -> &[Participant] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.rows.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.rows.iter_mut().find(|p| p.name == name)
    }

    /// Return the existing row for `name`, or insert a fresh one.
    ///
    /// The boolean is true when a new row was created.
    pub fn register(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(&Participant, bool), ValidationError> {
        let name = normalize_name(name)?;
        match self.rows.iter().position(|p| p.name == name) {
            Some(idx) => Ok((&self.rows[idx], false)),
            None => {
                self.rows.push(Participant::new(&name, now)?);
                let last = self.rows.len() - 1;
                Ok((&self.rows[last], true))
            }
        }
    }

    /// Replace the row with the same name, or append it.
    pub fn upsert(&mut self, participant: Participant) {
        match self.get_mut(&participant.name) {
            Some(existing) => *existing = participant,
            None => self.rows.push(participant),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.rows.iter()
    }
}
