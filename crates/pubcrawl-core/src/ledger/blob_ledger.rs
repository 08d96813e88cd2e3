use super::codec::{
    decode_participants, decode_punishments, encode_participants, encode_punishments, Decoded,
};
use super::{
    Ledger, LedgerSnapshot, ParticipantTable, PunishmentLog, PunishmentRecord, Recompute, Versions,
};
use crate::blob::BlobStore;
use crate::error::{CoreError, StoreError};
use crate::storage::StoreConfig;

/// Ledger kept as two delimited-text blobs in a [`BlobStore`].
///
/// Whole tables are rewritten on every write, so [`Ledger::commit_with`]
/// re-reads the blob, recomputes only its own rows and writes back with the
/// hash it read, retrying when someone else got there first.
pub struct BlobLedger<B: BlobStore> {
    store: B,
    participants_path: String,
    punishments_path: String,
    max_retries: u32,
}

impl<B: BlobStore> BlobLedger<B> {
    pub fn new(store: B, config: &StoreConfig) -> Self {
        Self {
            store,
            participants_path: config.participants_blob.clone(),
            punishments_path: config.punishments_blob.clone(),
            max_retries: config.max_retries,
        }
    }

    /// Read one table, degrading any failure to an empty table and a warning.
    fn load_table<T: Default>(
        &self,
        path: &str,
        decode: fn(&str) -> Result<Decoded<T>, StoreError>,
        warnings: &mut Vec<String>,
    ) -> (T, Option<String>) {
        let blob = match self.store.get(path) {
            Ok(Some(blob)) => blob,
            Ok(None) => return (T::default(), None),
            Err(e) => {
                let message = format!("could not read {path}: {e}");
                tracing::warn!("{message}");
                warnings.push(message);
                return (T::default(), None);
            }
        };

        match decode(&blob.content) {
            Ok(decoded) => {
                for w in decoded.warnings {
                    tracing::warn!(path, "{w}");
                    warnings.push(format!("{path}: {w}"));
                }
                (decoded.table, Some(blob.sha))
            }
            Err(e) => {
                // No version: a later save must not silently replace data we could not parse.
                let message = format!("could not parse {path}: {e}");
                tracing::warn!("{message}");
                warnings.push(message);
                (T::default(), None)
            }
        }
    }

    /// Read one table for a write. Unlike loads, failures are errors.
    fn read_table<T: Default>(
        &self,
        path: &str,
        decode: fn(&str) -> Result<Decoded<T>, StoreError>,
    ) -> Result<(T, Option<String>), StoreError> {
        match self.store.get(path)? {
            Some(blob) => Ok((decode(&blob.content)?.table, Some(blob.sha))),
            None => Ok((T::default(), None)),
        }
    }

    /// Read the blob, transform it, and write it back under the hash it had.
    fn read_modify_write<F>(&self, path: &str, message: &str, mut apply: F) -> Result<String, StoreError>
    where
        F: FnMut(Option<&str>) -> Result<String, StoreError>,
    {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let current = self.store.get(path)?;
            let next = apply(current.as_ref().map(|b| b.content.as_str()))?;
            let sha = current.as_ref().map(|b| b.sha.as_str());
            match self.store.upsert(path, message, &next, sha) {
                Ok(new_sha) => return Ok(new_sha),
                Err(StoreError::Conflict { .. }) => {
                    tracing::warn!(path, attempt, "blob changed underneath us, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::RetriesExhausted {
            path: path.to_string(),
            attempts,
        })
    }
}

impl<B: BlobStore> Ledger for BlobLedger<B> {
    fn load(&self) -> LedgerSnapshot {
        let mut warnings = Vec::new();
        let (participants, participants_sha) =
            self.load_table(&self.participants_path, decode_participants, &mut warnings);
        let (punishments, punishments_sha) =
            self.load_table(&self.punishments_path, decode_punishments, &mut warnings);

        LedgerSnapshot {
            participants,
            punishments,
            versions: Versions {
                participants: participants_sha,
                punishments: punishments_sha,
            },
            warnings,
        }
    }

    fn save(&self, snapshot: &mut LedgerSnapshot) -> Result<(), StoreError> {
        let sha = self.store.upsert(
            &self.participants_path,
            "Update participants",
            &encode_participants(&snapshot.participants),
            snapshot.versions.participants.as_deref(),
        )?;
        snapshot.versions.participants = Some(sha);

        let sha = self.store.upsert(
            &self.punishments_path,
            "Update punishments",
            &encode_punishments(&snapshot.punishments),
            snapshot.versions.punishments.as_deref(),
        )?;
        snapshot.versions.punishments = Some(sha);
        Ok(())
    }

    fn commit_with(
        &self,
        punishments: &[PunishmentRecord],
        recompute: &mut Recompute<'_>,
    ) -> Result<LedgerSnapshot, CoreError> {
        // The log goes first: an award must never be stored without the rows that earned it.
        if !punishments.is_empty() {
            let message = format!("Log {} punishment(s)", punishments.len());
            self.read_modify_write(&self.punishments_path, &message, |content| {
                let mut log = match content {
                    Some(text) => decode_punishments(text)?.table,
                    None => PunishmentLog::new(),
                };
                for r in punishments {
                    log.append(r.clone());
                }
                Ok(encode_punishments(&log))
            })?;
        }

        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let (participants, participants_sha) =
                self.read_table(&self.participants_path, decode_participants)?;
            let (log, punishments_sha) =
                self.read_table(&self.punishments_path, decode_punishments)?;
            let mut snapshot = LedgerSnapshot {
                participants,
                punishments: log,
                versions: Versions {
                    participants: participants_sha,
                    punishments: punishments_sha,
                },
                warnings: Vec::new(),
            };

            let rows = recompute(&snapshot)?;
            if rows.is_empty() {
                return Ok(snapshot);
            }
            let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
            let message = format!("Update progress for {}", names.join(", "));
            for p in &rows {
                snapshot.participants.upsert(p.clone());
            }

            match self.store.upsert(
                &self.participants_path,
                &message,
                &encode_participants(&snapshot.participants),
                snapshot.versions.participants.as_deref(),
            ) {
                Ok(sha) => {
                    snapshot.versions.participants = Some(sha);
                    tracing::info!(
                        ledger = %self.describe(),
                        participants = rows.len(),
                        punishments = punishments.len(),
                        "changeset committed"
                    );
                    return Ok(snapshot);
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::warn!(
                        path = %self.participants_path,
                        attempt,
                        "participants changed underneath us, recomputing"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::RetriesExhausted {
            path: self.participants_path.clone(),
            attempts,
        }
        .into())
    }

    fn reset(&self) -> Result<(), StoreError> {
        let empty_participants = encode_participants(&ParticipantTable::new());
        self.read_modify_write(&self.participants_path, "Reset participants", |_| {
            Ok(empty_participants.clone())
        })?;
        let empty_punishments = encode_punishments(&PunishmentLog::new());
        self.read_modify_write(&self.punishments_path, "Reset punishments", |_| {
            Ok(empty_punishments.clone())
        })?;
        tracing::info!(ledger = %self.describe(), "ledger reset");
        Ok(())
    }

    fn describe(&self) -> String {
        self.store.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::Achievement;
    use crate::blob::{Blob, MemoryBlobStore};
    use crate::ledger::{Changeset, Participant};
    use chrono::Utc;
    use std::cell::Cell;

    fn ledger(store: MemoryBlobStore) -> BlobLedger<MemoryBlobStore> {
        BlobLedger::new(store, &StoreConfig::default())
    }

    fn participant(name: &str, points: u64) -> Participant {
        let mut p = Participant::new(name, Utc::now()).unwrap();
        p.points = points;
        p
    }

    /// Lets another writer sneak in before the first `n` updates.
    struct Interleaved {
        inner: MemoryBlobStore,
        remaining: Cell<u32>,
        intruder: Participant,
    }

    impl BlobStore for Interleaved {
        fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
            self.inner.get(path)
        }

        fn create(&self, path: &str, message: &str, content: &str) -> Result<String, StoreError> {
            self.inner.create(path, message, content)
        }

        fn update(
            &self,
            path: &str,
            message: &str,
            content: &str,
            sha: &str,
        ) -> Result<String, StoreError> {
            if self.remaining.get() > 0 {
                self.remaining.set(self.remaining.get() - 1);
                let current = self.inner.get(path)?.map(|b| b.content).unwrap_or_default();
                let mut table = decode_participants(&current)?.table;
                let mut intruder = self.intruder.clone();
                intruder.points += u64::from(self.remaining.get());
                table.upsert(intruder);
                self.inner.put(path, &encode_participants(&table))?;
            }
            self.inner.update(path, message, content, sha)
        }

        fn describe(&self) -> String {
            "interleaved".to_string()
        }
    }

    #[test]
    fn load_from_empty_store_gives_empty_tables() {
        let snapshot = ledger(MemoryBlobStore::new()).load();
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.punishments.is_empty());
        assert!(snapshot.warnings.is_empty());
        assert_eq!(snapshot.versions, Default::default());
    }

    #[test]
    fn load_tolerates_garbage_and_keeps_the_other_table() {
        let store = MemoryBlobStore::new();
        store.put("participants.csv", "this is not,a ledger\n").unwrap();
        store
            .put(
                "punishments.csv",
                "Time,Name,Pub,Punishment\n2025-12-13T20:00:00Z,Mark,Lavery's,Do ten press-ups\n",
            )
            .unwrap();

        let snapshot = ledger(store).load();
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.versions.participants.is_none());
        assert_eq!(snapshot.punishments.len(), 1);
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("participants.csv"));
    }

    #[test]
    fn save_creates_then_updates_and_detects_stale_versions() {
        let store = MemoryBlobStore::new();
        let ledger = ledger(store.clone());

        let mut snapshot = ledger.load();
        snapshot.participants.upsert(participant("Mark", 0));
        ledger.save(&mut snapshot).unwrap();
        assert!(snapshot.versions.participants.is_some());

        let mut stale = snapshot.clone();
        snapshot.participants.upsert(participant("Mark", 100));
        ledger.save(&mut snapshot).unwrap();

        stale.participants.upsert(participant("Aoife", 0));
        assert!(matches!(
            ledger.save(&mut stale),
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(ledger.load().participants.get("Mark").unwrap().points, 100);
    }

    #[test]
    fn commit_merges_with_rows_written_by_others() {
        let store = MemoryBlobStore::new();
        let ledger = ledger(store.clone());

        ledger
            .commit(&Changeset {
                participants: vec![participant("Aoife", 300)],
                punishments: vec![],
            })
            .unwrap();
        ledger
            .commit(&Changeset {
                participants: vec![participant("Mark", 100)],
                punishments: vec![PunishmentRecord {
                    time: Utc::now(),
                    name: "Mark".into(),
                    stop: "Lavery's".into(),
                    punishment: "Do ten press-ups".into(),
                }],
            })
            .unwrap();

        let snapshot = ledger.load();
        assert_eq!(snapshot.participants.len(), 2);
        assert_eq!(snapshot.participants.get("Aoife").unwrap().points, 300);
        assert_eq!(snapshot.punishments.len(), 1);
    }

    #[test]
    fn commit_retries_after_a_concurrent_write() {
        let inner = MemoryBlobStore::new();
        inner
            .put("participants.csv", &encode_participants(&ParticipantTable::new()))
            .unwrap();
        let ledger = BlobLedger::new(
            Interleaved {
                inner: inner.clone(),
                remaining: Cell::new(2),
                intruder: participant("Aoife", 500),
            },
            &StoreConfig::default(),
        );

        ledger
            .commit(&Changeset {
                participants: vec![participant("Mark", 100)],
                punishments: vec![],
            })
            .unwrap();

        let table = decode_participants(&inner.get("participants.csv").unwrap().unwrap().content)
            .unwrap()
            .table;
        assert_eq!(table.get("Mark").unwrap().points, 100);
        assert_eq!(table.get("Aoife").unwrap().points, 500);
    }

    #[test]
    fn commit_recomputes_a_row_another_writer_changed() {
        let inner = MemoryBlobStore::new();
        let ledger = ledger(inner.clone());
        ledger
            .commit(&Changeset {
                participants: vec![participant("Mark", 0)],
                punishments: vec![],
            })
            .unwrap();

        // Someone completes Mark's first stop between our read and our write.
        let mut concurrent = participant("Mark", 200);
        concurrent.completed_stops = vec!["Lavery's".to_string()];
        concurrent.current_stop = 1;
        concurrent.achievements.insert(Achievement::FirstTimer);
        let ledger = BlobLedger::new(
            Interleaved {
                inner: inner.clone(),
                remaining: Cell::new(1),
                intruder: concurrent,
            },
            &StoreConfig::default(),
        );

        let mut seen = Vec::new();
        let stored = ledger
            .commit_with(&[], &mut |current: &LedgerSnapshot| {
                let mut mark = current.participants.get("Mark").cloned().unwrap();
                seen.push(mark.points);
                mark.achievements.insert(Achievement::RuleBreaker);
                mark.points += 150;
                Ok(vec![mark])
            })
            .unwrap();

        assert_eq!(seen, vec![0, 200]);
        let mark = stored.participants.get("Mark").unwrap();
        assert_eq!(mark.points, 350);
        assert_eq!(mark.current_stop, 1);
        assert!(mark.has(Achievement::FirstTimer));
        assert!(mark.has(Achievement::RuleBreaker));
        assert_eq!(ledger.load().participants.get("Mark"), Some(mark));
    }

    #[test]
    fn commit_writes_the_log_before_the_participant_row() {
        let inner = MemoryBlobStore::new();
        inner
            .put("participants.csv", &encode_participants(&ParticipantTable::new()))
            .unwrap();
        let ledger = BlobLedger::new(
            Interleaved {
                inner: inner.clone(),
                remaining: Cell::new(100),
                intruder: participant("Aoife", 0),
            },
            &StoreConfig::default(),
        );
        let record = PunishmentRecord {
            time: Utc::now(),
            name: "Mark".into(),
            stop: "Lavery's".into(),
            punishment: "Do ten press-ups".into(),
        };

        let result = ledger.commit(&Changeset {
            participants: vec![participant("Mark", 150)],
            punishments: vec![record.clone()],
        });

        assert!(result.is_err());
        let log = decode_punishments(&inner.get("punishments.csv").unwrap().unwrap().content)
            .unwrap()
            .table;
        assert_eq!(log.rows(), &[record]);
        let table = decode_participants(&inner.get("participants.csv").unwrap().unwrap().content)
            .unwrap()
            .table;
        assert!(table.get("Mark").is_none());
    }

    #[test]
    fn commit_gives_up_after_max_retries() {
        let inner = MemoryBlobStore::new();
        inner
            .put("participants.csv", &encode_participants(&ParticipantTable::new()))
            .unwrap();
        let ledger = BlobLedger::new(
            Interleaved {
                inner,
                remaining: Cell::new(100),
                intruder: participant("Aoife", 0),
            },
            &StoreConfig::default(),
        );

        let err = ledger
            .commit(&Changeset {
                participants: vec![participant("Mark", 100)],
                punishments: vec![],
            })
            .unwrap_err();
        assert!(
            matches!(err, CoreError::Store(StoreError::RetriesExhausted { attempts: 4, .. })),
            "{err}"
        );
    }

    #[test]
    fn reset_clears_both_tables() {
        let store = MemoryBlobStore::new();
        let ledger = ledger(store);
        ledger
            .commit(&Changeset {
                participants: vec![participant("Mark", 100)],
                punishments: vec![],
            })
            .unwrap();
        ledger.reset().unwrap();

        let snapshot = ledger.load();
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.punishments.is_empty());
        assert!(snapshot.versions.punishments.is_some());
    }
}
