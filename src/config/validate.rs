// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{EngineError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EngineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.general, raw.unit))
    }
}

/// Run every semantic check on a raw configuration.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine_section(cfg)?;
    validate_unit_names(cfg)?;
    Ok(())
}

fn validate_engine_section(cfg: &RawConfigFile) -> Result<()> {
    let engine = &cfg.engine;

    if !engine.cache_timeout.is_finite() || engine.cache_timeout <= 0.0 {
        return Err(EngineError::ConfigError(format!(
            "[engine].cache_timeout must be a positive number of seconds (got {})",
            engine.cache_timeout
        )));
    }

    if !engine.minimum_interval.is_finite() || engine.minimum_interval < 0.0 {
        return Err(EngineError::ConfigError(format!(
            "[engine].minimum_interval must be >= 0 seconds (got {})",
            engine.minimum_interval
        )));
    }

    Ok(())
}

fn validate_unit_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.unit.keys() {
        if name.trim().is_empty() {
            return Err(EngineError::ConfigError(
                "[unit.\"...\"] block with an empty unit name".to_string(),
            ));
        }
    }
    Ok(())
}
