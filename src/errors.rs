// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Invalid option '{option}' for unit '{unit}': {reason}")]
    InvalidOption {
        unit: String,
        option: String,
        reason: String,
    },

    #[error("Unit is no longer running: {0}")]
    UnitGone(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A producer result that breaks the output record contract.
///
/// These are reported exactly like a fault raised by the producer itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("response should be a record (object) or a [position, record] pair")]
    NotARecord,

    #[error("missing \"full_text\" key in response")]
    MissingFullText,

    #[error("\"cached_until\" must be a number, got {0}")]
    BadCacheDeadline(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
