//! The punishment wheel.
//!
//! A spin is a uniform draw with replacement. Any "spinning" delay is a
//! presentation concern; the draw itself is instantaneous.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ledger::PunishmentRecord;

/// Wheel entries used when the config does not override them.
pub const DEFAULT_PUNISHMENTS: [&str; 12] = [
    "Do an Irish dance",
    "Sing a Christmas carol",
    "Buy the next round of shots",
    "Drink with your non-dominant hand",
    "Speak in rhyme until the next pub",
    "Wear your jumper inside out",
    "Tell a terrible joke to a stranger",
    "Down your drink in one",
    "Do ten press-ups",
    "Swap a clothing item with a teammate",
    "No toilet break at the next pub",
    "Let the group post on your social media",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishmentWheel {
    entries: Vec<String>,
}

impl PunishmentWheel {
    /// Build a wheel from distinct, non-blank entries.
    pub fn new<I, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into().trim().to_string();
            if entry.is_empty() || distinct.contains(&entry) {
                continue;
            }
            distinct.push(entry);
        }
        if distinct.is_empty() {
            return Err(ValidationError::EmptyWheel);
        }
        Ok(Self { entries: distinct })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one entry uniformly at random.
    pub fn spin<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // `new` guarantees at least one entry.
        self.entries
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Spin and package the result as a log row.
    pub fn spin_for<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        name: &str,
        stop: &str,
        at: DateTime<Utc>,
    ) -> PunishmentRecord {
        PunishmentRecord {
            time: at,
            name: name.to_string(),
            stop: stop.to_string(),
            punishment: self.spin(rng).to_string(),
        }
    }
}

impl Default for PunishmentWheel {
    fn default() -> Self {
        Self {
            entries: DEFAULT_PUNISHMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Deterministic generator for reproducible spins (`--seed` on the CLI, tests).
pub fn seeded_rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}
