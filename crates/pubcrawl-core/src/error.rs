//! Core error types for pubcrawl-core.
//!
//! This module defines the error hierarchy using thiserror. Read paths in the
//! ledger degrade to warnings instead of returning these; write paths and
//! validation propagate them to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pubcrawl-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Ledger / backing store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by blob stores and ledgers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The blob to update does not exist
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The blob changed since its hash was read (or already exists on create)
    #[error("Write conflict on '{path}': blob changed since it was read")]
    Conflict { path: String },

    /// Optimistic write kept conflicting
    #[error("Gave up writing '{path}' after {attempts} conflicting attempts")]
    RetriesExhausted { path: String, attempts: u32 },

    /// Malformed delimited text
    #[error("Malformed {table} table at line {line}: {message}")]
    Codec {
        table: &'static str,
        line: usize,
        message: String,
    },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with an unexpected status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else the backend reports
    #[error("{0}")]
    Backend(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Participant names must contain something other than whitespace
    #[error("Participant name must not be empty")]
    EmptyName,

    /// A mutating action named someone who never registered
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// Route does not have the expected shape
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// The punishment wheel has nothing on it
    #[error("Punishment wheel has no entries")]
    EmptyWheel,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
