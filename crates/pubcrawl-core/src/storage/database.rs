//! SQLite-backed ledger.
//!
//! A commit reads, recomputes and upserts inside one `BEGIN IMMEDIATE`
//! transaction, so concurrent players never overwrite each other's rows and
//! a commit lands in both tables or neither.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::achievements::Achievement;
use crate::error::{CoreError, StoreError};
use crate::ledger::{
    Ledger, LedgerSnapshot, Participant, ParticipantTable, PunishmentLog, PunishmentRecord,
    Recompute,
};

use super::migrations;

/// SQLite database holding the participants and punishments tables.
pub struct SqliteLedger {
    conn: Connection,
    label: String,
}

impl SqliteLedger {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open (creating if needed) the database file at `path` and migrate it.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn,
            label: format!("sqlite:{}", path.display()),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn,
            label: "sqlite::memory:".to_string(),
        })
    }

    fn read_participants(conn: &Connection) -> Result<(ParticipantTable, Vec<String>), StoreError> {
        let mut stmt = conn.prepare(
            "SELECT name, completed_stops, points, achievements, start_time
             FROM participants
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut table = ParticipantTable::new();
        let mut warnings = Vec::new();
        for row in rows {
            let (name, completed_json, points, achievements_json, start_time) = row?;
            let start_time = DateTime::parse_from_rfc3339(&start_time)
                .map_err(|e| StoreError::Backend(format!("{name}: bad start_time: {e}")))?
                .with_timezone(&Utc);

            let mut participant = Participant::new(&name, start_time)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            participant.completed_stops = serde_json::from_str(&completed_json)?;
            participant.current_stop = participant.completed_stops.len();
            participant.points = points;
            for id in serde_json::from_str::<Vec<String>>(&achievements_json)? {
                match id.parse::<Achievement>() {
                    Ok(a) => {
                        participant.achievements.insert(a);
                    }
                    Err(_) => warnings.push(format!("{name}: skipping unknown achievement '{id}'")),
                }
            }
            table.upsert(participant);
        }
        Ok((table, warnings))
    }

    fn read_punishments(conn: &Connection) -> Result<PunishmentLog, StoreError> {
        let mut stmt = conn.prepare("SELECT time, name, stop, punishment FROM punishments ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut log = PunishmentLog::new();
        for row in rows {
            let (time, name, stop, punishment) = row?;
            let time = DateTime::parse_from_rfc3339(&time)
                .map_err(|e| StoreError::Backend(format!("bad punishment time '{time}': {e}")))?
                .with_timezone(&Utc);
            log.append(PunishmentRecord {
                time,
                name,
                stop,
                punishment,
            });
        }
        Ok(log)
    }

    /// Insert or update one participant row. `start_time` is only written on insert.
    fn upsert_participant(tx: &Transaction<'_>, p: &Participant) -> Result<(), StoreError> {
        let achievements: Vec<&str> = p.achievements.iter().map(|a| a.id()).collect();
        tx.execute(
            "INSERT INTO participants (name, current_stop, completed_stops, points, achievements, start_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                current_stop = excluded.current_stop,
                completed_stops = excluded.completed_stops,
                points = excluded.points,
                achievements = excluded.achievements",
            params![
                p.name,
                p.current_stop,
                serde_json::to_string(&p.completed_stops)?,
                p.points,
                serde_json::to_string(&achievements)?,
                p.start_time.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_punishment(tx: &Transaction<'_>, r: &PunishmentRecord) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO punishments (time, name, stop, punishment) VALUES (?1, ?2, ?3, ?4)",
            params![r.time.to_rfc3339(), r.name, r.stop, r.punishment],
        )?;
        Ok(())
    }
}

impl Ledger for SqliteLedger {
    fn load(&self) -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::default();
        match Self::read_participants(&self.conn) {
            Ok((table, warnings)) => {
                snapshot.participants = table;
                snapshot.warnings.extend(warnings);
            }
            Err(e) => snapshot.warnings.push(format!("could not read participants: {e}")),
        }
        match Self::read_punishments(&self.conn) {
            Ok(log) => snapshot.punishments = log,
            Err(e) => snapshot.warnings.push(format!("could not read punishments: {e}")),
        }
        for w in &snapshot.warnings {
            tracing::warn!(ledger = %self.label, "{w}");
        }
        snapshot
    }

    fn save(&self, snapshot: &mut LedgerSnapshot) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM participants", [])?;
        tx.execute("DELETE FROM punishments", [])?;
        for p in snapshot.participants.iter() {
            Self::upsert_participant(&tx, p)?;
        }
        for r in snapshot.punishments.rows() {
            Self::insert_punishment(&tx, r)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn commit_with(
        &self,
        punishments: &[PunishmentRecord],
        recompute: &mut Recompute<'_>,
    ) -> Result<LedgerSnapshot, CoreError> {
        // Immediate: take the write lock before reading so no one can slip in between.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        for r in punishments {
            Self::insert_punishment(&tx, r)?;
        }

        let (participants, warnings) = Self::read_participants(&tx)?;
        let mut snapshot = LedgerSnapshot {
            participants,
            punishments: Self::read_punishments(&tx)?,
            warnings,
            ..LedgerSnapshot::default()
        };
        let rows = recompute(&snapshot)?;
        for p in &rows {
            Self::upsert_participant(&tx, p)?;
            let mut row = p.clone();
            if let Some(existing) = snapshot.participants.get(&p.name) {
                row.start_time = existing.start_time;
            }
            snapshot.participants.upsert(row);
        }
        tx.commit().map_err(StoreError::from)?;

        tracing::info!(
            ledger = %self.label,
            participants = rows.len(),
            punishments = punishments.len(),
            "changeset committed"
        );
        Ok(snapshot)
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "BEGIN;
             DELETE FROM participants;
             DELETE FROM punishments;
             COMMIT;",
        )?;
        tracing::info!(ledger = %self.label, "ledger reset");
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
