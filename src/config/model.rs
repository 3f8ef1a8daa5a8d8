// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::logging::LogLevel;

/// Option values of one `[unit."<full name>"]` block, as written.
pub type UnitOptionMap = BTreeMap<String, Value>;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// cache_timeout = 60
/// minimum_interval = 0.1
///
/// [general]
/// color_good = "#00FF00"
///
/// [unit."vpn_status home"]
/// separator = false
/// format = "VPN: {name}"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Engine timing behaviour from `[engine]`.
    #[serde(default)]
    pub engine: EngineSection,

    /// General display configuration from `[general]`.
    ///
    /// Handed verbatim to legacy-convention producers.
    #[serde(default)]
    pub general: Map<String, Value>,

    /// Per-unit option blocks from `[unit."<name> <instance>"]`.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitOptionMap>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (or the unchecked
/// constructor used by that conversion).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub general: Map<String, Value>,
    pub unit: BTreeMap<String, UnitOptionMap>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        general: Map<String, Value>,
        unit: BTreeMap<String, UnitOptionMap>,
    ) -> Self {
        Self {
            engine,
            general,
            unit,
        }
    }

    /// Option block for a unit, or an empty block when none was configured.
    pub fn unit_options(&self, full_name: &str) -> UnitOptionMap {
        self.unit.get(full_name).cloned().unwrap_or_default()
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.engine, raw.general, raw.unit)
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Default cache duration in seconds, used when a producer does not set
    /// `cached_until` itself.
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout: f64,

    /// Lower bound in seconds for any automatically armed wake-up.
    #[serde(default = "default_minimum_interval")]
    pub minimum_interval: f64,

    /// Optional log level; falls back to `BARENGINE_LOG` / `info`.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

fn default_cache_timeout() -> f64 {
    60.0
}

fn default_minimum_interval() -> f64 {
    0.1
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            cache_timeout: default_cache_timeout(),
            minimum_interval: default_minimum_interval(),
            log_level: None,
        }
    }
}
