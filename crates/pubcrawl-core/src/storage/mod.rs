mod config;
pub mod database;
pub mod migrations;

pub use config::{
    Backend, CacheConfig, Config, GitHubStoreConfig, LogConfig, ScoringConfig, StoreConfig,
    WheelConfig,
};
pub use database::SqliteLedger;

use std::path::PathBuf;

use crate::blob::{FsBlobStore, MemoryBlobStore};
use crate::error::{ConfigError, CoreError};
use crate::integrations::github::GitHubBlobStore;
use crate::ledger::{BlobLedger, Ledger};

/// Returns `~/.config/pubcrawl[-dev]/` based on PUBCRAWL_ENV.
///
/// Set PUBCRAWL_ENV=dev to use development data directory, or
/// PUBCRAWL_DATA_DIR to put everything somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("PUBCRAWL_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("PUBCRAWL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pubcrawl-dev")
            } else {
                base_dir.join("pubcrawl")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Open the ledger selected by `[store]`.
pub fn open_ledger(config: &Config) -> Result<Box<dyn Ledger>, CoreError> {
    let store = &config.store;
    let ledger: Box<dyn Ledger> = match store.backend {
        Backend::Sqlite => Box::new(SqliteLedger::open(&data_dir()?.join("pubcrawl.db"))?),
        Backend::Files => {
            let blobs = FsBlobStore::open(data_dir()?.join("ledger"))?;
            Box::new(BlobLedger::new(blobs, store))
        }
        Backend::Github => {
            let github = &store.github;
            if github.owner.is_empty() || github.repo.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "store.github".to_string(),
                    message: "owner and repo must be set for the github backend".to_string(),
                }
                .into());
            }
            let blobs = GitHubBlobStore::from_config(github)?;
            Box::new(BlobLedger::new(blobs, store))
        }
        Backend::Memory => Box::new(BlobLedger::new(MemoryBlobStore::new(), store)),
    };
    tracing::debug!(backend = %ledger.describe(), "ledger opened");
    Ok(ledger)
}
