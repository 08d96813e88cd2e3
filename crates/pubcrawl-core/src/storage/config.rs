//! TOML-based application configuration.
//!
//! Stores:
//! - Scoring constants (per-stop award, achievement bonuses, Speed Demon window)
//! - The punishment wheel entries
//! - Ledger backend selection and GitHub coordinates
//! - Snapshot cache TTL and log filter
//!
//! Configuration is stored at `~/.config/pubcrawl/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::achievements::Achievement;
use crate::error::{ConfigError, ValidationError};
use crate::punishment::{PunishmentWheel, DEFAULT_PUNISHMENTS};

/// Point values for stops and achievements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_stop_award")]
    pub stop_award: u64,
    #[serde(default = "default_speed_demon_hours")]
    pub speed_demon_hours: u32,
    /// Per-achievement overrides keyed by achievement id.
    #[serde(default)]
    pub achievement_points: BTreeMap<String, u64>,
}

impl ScoringConfig {
    pub fn points_for(&self, achievement: Achievement) -> u64 {
        self.achievement_points
            .get(achievement.id())
            .copied()
            .unwrap_or_else(|| achievement.default_points())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelConfig {
    #[serde(default = "default_wheel_entries")]
    pub entries: Vec<String>,
}

/// Which ledger implementation backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Sqlite,
    Files,
    Github,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubStoreConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_participants_blob")]
    pub participants_blob: String,
    #[serde(default = "default_punishments_blob")]
    pub punishments_blob: String,
    /// Conflicting writes are re-read and retried this many times.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub github: GitHubStoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pubcrawl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// Default functions
fn default_stop_award() -> u64 {
    100
}
fn default_speed_demon_hours() -> u32 {
    3
}
fn default_wheel_entries() -> Vec<String> {
    DEFAULT_PUNISHMENTS.iter().map(|s| s.to_string()).collect()
}
fn default_backend() -> Backend {
    Backend::Sqlite
}
fn default_branch() -> String {
    "main".into()
}
fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_participants_blob() -> String {
    "participants.csv".into()
}
fn default_punishments_blob() -> String {
    "punishments.csv".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_ttl_secs() -> u64 {
    30
}
fn default_log_filter() -> String {
    "warn".into()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            stop_award: default_stop_award(),
            speed_demon_hours: default_speed_demon_hours(),
            achievement_points: BTreeMap::new(),
        }
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            entries: default_wheel_entries(),
        }
    }
}

impl Default for GitHubStoreConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            participants_blob: default_participants_blob(),
            punishments_blob: default_punishments_blob(),
            max_retries: default_max_retries(),
            github: GitHubStoreConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    let n = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Location of the config file in the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// The punishment wheel described by `[wheel]`.
    pub fn wheel(&self) -> Result<PunishmentWheel, ValidationError> {
        PunishmentWheel::new(self.wheel.entries.iter().cloned())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.scoring.stop_award, 100);
        assert_eq!(parsed.store.backend, Backend::Sqlite);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [scoring]
            stop_award = 150

            [scoring.achievement_points]
            golden_route = 1000

            [store]
            backend = "github"

            [store.github]
            owner = "crew"
            repo = "crawl-ledger"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scoring.stop_award, 150);
        assert_eq!(cfg.scoring.speed_demon_hours, 3);
        assert_eq!(cfg.scoring.points_for(Achievement::GoldenRoute), 1000);
        assert_eq!(cfg.scoring.points_for(Achievement::FirstTimer), 100);
        assert_eq!(cfg.store.backend, Backend::Github);
        assert_eq!(cfg.store.github.branch, "main");
        assert_eq!(cfg.wheel.entries.len(), 12);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scoring.stop_award").as_deref(), Some("100"));
        assert_eq!(cfg.get("store.backend").as_deref(), Some("sqlite"));
        assert_eq!(cfg.get("store.github.branch").as_deref(), Some("main"));
        assert!(cfg.get("store.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("scoring.stop_award", "50").unwrap();
        cfg.set("store.backend", "files").unwrap();
        cfg.set("store.github.owner", "crew").unwrap();
        assert_eq!(cfg.scoring.stop_award, 50);
        assert_eq!(cfg.store.backend, Backend::Files);
        assert_eq!(cfg.store.github.owner, "crew");
    }

    #[test]
    fn set_accepts_json_for_tables() {
        let mut cfg = Config::default();
        cfg.set("scoring.achievement_points", r#"{"speed_demon": 900}"#)
            .unwrap();
        assert_eq!(cfg.scoring.points_for(Achievement::SpeedDemon), 900);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("scoring.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("scoring.stop_award", "lots").is_err());
        assert!(cfg.set("store.backend", "postgres").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.cache.ttl_secs = 5;
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().cache.ttl_secs, 5);
    }

    #[test]
    fn wheel_from_config() {
        let mut cfg = Config::default();
        assert_eq!(cfg.wheel().unwrap().len(), 12);
        cfg.wheel.entries.clear();
        assert_eq!(cfg.wheel().unwrap_err(), ValidationError::EmptyWheel);
    }
}
