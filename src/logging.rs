// src/logging.rs

//! Logging setup for `barengine` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. explicit level (e.g. `[engine].log_level` from the config file)
//! 2. `BARENGINE_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR because stdout belongs to the bar host.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing_subscriber::fmt;

use crate::config::ConfigFile;

/// Log level as accepted in configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Pick the effective level: explicit, then the `BARENGINE_LOG` value, then `info`.
pub fn resolve_level(explicit: Option<LogLevel>, env: Option<&str>) -> LogLevel {
    explicit
        .or_else(|| env.and_then(|s| s.parse::<LogLevel>().ok()))
        .unwrap_or(LogLevel::Info)
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup; a second call reports an error instead of
/// panicking.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var("BARENGINE_LOG").ok();
    let level: tracing::Level = resolve_level(level, env.as_deref()).into();

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Initialise logging with the level from `[engine].log_level`.
pub fn init_logging_from(config: &ConfigFile) -> Result<()> {
    init_logging(config.engine.log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names_case_insensitively() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn config_level_beats_environment() {
        let cfg = crate::config::load_from_str("[engine]\nlog_level = \"debug\"\n")
            .and_then(ConfigFile::try_from)
            .unwrap();
        assert_eq!(resolve_level(cfg.engine.log_level, Some("trace")), LogLevel::Debug);
    }

    #[test]
    fn environment_then_default_apply_without_config_level() {
        assert_eq!(resolve_level(None, Some("warning")), LogLevel::Warn);
        assert_eq!(resolve_level(None, Some("nonsense")), LogLevel::Info);
        assert_eq!(resolve_level(None, None), LogLevel::Info);
    }
}
