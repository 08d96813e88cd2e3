//! The shared progress ledger: Participants and Punishments tables and the
//! stores that persist them.

mod blob_ledger;
pub mod codec;
mod participant;
mod punishment_log;

pub use blob_ledger::BlobLedger;
pub use participant::{normalize_name, Participant, ParticipantTable};
pub use punishment_log::{PunishmentLog, PunishmentRecord};

use serde::Serialize;

use crate::error::{CoreError, StoreError};

/// Both tables as read at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub participants: ParticipantTable,
    pub punishments: PunishmentLog,
    /// Version hashes of the blobs the tables came from (blob ledgers only).
    #[serde(skip)]
    pub versions: Versions,
    /// Problems tolerated while loading. Non-empty means the data may be partial.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions {
    pub participants: Option<String>,
    pub punishments: Option<String>,
}

/// The rows one action touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    /// Rows to upsert, matched by name.
    pub participants: Vec<Participant>,
    /// Rows to append.
    pub punishments: Vec<PunishmentRecord>,
}

/// Derives an action's participant rows from the state a commit attempt read.
///
/// Returning no rows means the action has nothing to write.
pub type Recompute<'a> = dyn FnMut(&LedgerSnapshot) -> Result<Vec<Participant>, CoreError> + 'a;

/// Persistence boundary for the two tables.
pub trait Ledger {
    /// Read both tables. Never fails: unreadable tables come back empty and
    /// the problem is recorded in `warnings`.
    fn load(&self) -> LedgerSnapshot;

    /// Write both tables wholesale, based on the versions in the snapshot.
    /// Advances the snapshot's versions on success.
    fn save(&self, snapshot: &mut LedgerSnapshot) -> Result<(), StoreError>;

    /// Append `punishments`, then upsert the participant rows `recompute`
    /// derives from the stored state read after that append.
    ///
    /// If the participants table changes between that read and the write,
    /// the state is read again and `recompute` runs again, so concurrent
    /// actions on the same participant build on each other instead of one
    /// overwriting the other. Returns the stored state after the write.
    fn commit_with(
        &self,
        punishments: &[PunishmentRecord],
        recompute: &mut Recompute<'_>,
    ) -> Result<LedgerSnapshot, CoreError>;

    /// Upsert fixed rows and append fixed punishments.
    fn commit(&self, changes: &Changeset) -> Result<(), CoreError> {
        let rows = &changes.participants;
        self.commit_with(&changes.punishments, &mut |_: &LedgerSnapshot| Ok(rows.clone()))?;
        Ok(())
    }

    /// Clear both tables.
    fn reset(&self) -> Result<(), StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
