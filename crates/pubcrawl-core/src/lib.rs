//! # Pubcrawl Core Library
//!
//! This library provides the core logic for the "12 pubs of Christmas" crawl
//! tracker. It implements a CLI-first philosophy where every operation is
//! available through the standalone `pubcrawl` binary, with any richer front
//! end being a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Ledger**: the shared Participants and Punishments tables, persisted as
//!   delimited-text blobs (files, GitHub contents API, memory) or in SQLite
//! - **Progress**: advancing a participant along the fixed 12-stop route
//! - **Achievements**: predicates over progress and punishment history,
//!   granted at most once each
//! - **Punishment wheel**: uniform random draw from a fixed list
//! - **Session**: per-invocation context that runs actions against a ledger
//!
//! ## Key Components
//!
//! - [`Session`]: register, complete, spin, evaluate, read standings
//! - [`Ledger`]: persistence boundary, implemented by [`BlobLedger`] and
//!   [`SqliteLedger`]
//! - [`Config`]: application configuration management

pub mod achievements;
pub mod blob;
pub mod error;
pub mod events;
pub mod integrations;
pub mod leaderboard;
pub mod ledger;
pub mod progress;
pub mod punishment;
pub mod route;
pub mod session;
pub mod storage;

pub use achievements::{Achievement, EvalContext, Unlock};
pub use blob::{Blob, BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use leaderboard::Standing;
pub use ledger::{
    BlobLedger, Changeset, Ledger, LedgerSnapshot, Participant, ParticipantTable, PunishmentLog,
    PunishmentRecord, Recompute,
};
pub use punishment::PunishmentWheel;
pub use route::{Route, Stop};
pub use session::{ActionOutcome, Session};
pub use storage::{Config, SqliteLedger};
