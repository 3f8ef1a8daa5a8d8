#![allow(dead_code)]

use std::collections::BTreeMap;

use barengine::config::{ConfigFile, RawConfigFile, UnitOptionMap};
use serde_json::Value;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn cache_timeout(mut self, secs: f64) -> Self {
        self.config.engine.cache_timeout = secs;
        self
    }

    pub fn minimum_interval(mut self, secs: f64) -> Self {
        self.config.engine.minimum_interval = secs;
        self
    }

    pub fn with_general(mut self, key: &str, value: Value) -> Self {
        self.config.general.insert(key.to_string(), value);
        self
    }

    pub fn with_unit_option(mut self, unit: &str, key: &str, value: Value) -> Self {
        self.config
            .unit
            .entry(unit.to_string())
            .or_insert_with(UnitOptionMap::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Option block for direct use with `UniversalOptions::from_config`.
pub fn option_block(pairs: &[(&str, Value)]) -> UnitOptionMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<BTreeMap<_, _>>()
}
