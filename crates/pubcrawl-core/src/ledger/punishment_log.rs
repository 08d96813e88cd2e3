use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One wheel spin: who got what, where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishmentRecord {
    pub time: DateTime<Utc>,
    pub name: String,
    pub stop: String,
    pub punishment: String,
}

/// Append-only log of punishments, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PunishmentLog {
    rows: Vec<PunishmentRecord>,
}

impl PunishmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<PunishmentRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[PunishmentRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, record: PunishmentRecord) {
        self.rows.push(record);
    }

    pub fn for_participant<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a PunishmentRecord> + 'a {
        self.rows.iter().filter(move |r| r.name == name)
    }

    pub fn count_for(&self, name: &str) -> usize {
        self.for_participant(name).count()
    }

    pub fn count_at_stop(&self, name: &str, stop: &str) -> usize {
        self.for_participant(name).filter(|r| r.stop == stop).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, stop: &str, punishment: &str) -> PunishmentRecord {
        PunishmentRecord {
            time: Utc::now(),
            name: name.to_string(),
            stop: stop.to_string(),
            punishment: punishment.to_string(),
        }
    }

    #[test]
    fn counts_filter_by_participant_and_stop() {
        let log = PunishmentLog::from_rows(vec![
            record("Mark", "Lavery's", "Do ten press-ups"),
            record("Mark", "The Points", "Do ten press-ups"),
            record("Aoife", "Lavery's", "Sing a Christmas carol"),
        ]);
        assert_eq!(log.count_for("Mark"), 2);
        assert_eq!(log.count_at_stop("Mark", "Lavery's"), 1);
        assert_eq!(log.count_at_stop("Aoife", "The Points"), 0);
        assert_eq!(log.count_for("Nobody"), 0);
    }
}
