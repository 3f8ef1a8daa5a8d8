// src/loader.rs

//! Unit loader: resolves a unit name to a constructor and builds one live
//! instance from its configuration block.
//!
//! Resolution is two-tier and explicit: user overrides are consulted first,
//! then the bundled built-ins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::UnitOptionMap;
use crate::errors::{EngineError, Result};
use crate::options::UniversalOptions;
use crate::unit::{StatusUnit, UnitContext, UnitId};

/// Constructor of one kind of unit.
pub type UnitFactory =
    Arc<dyn Fn(UnitContext) -> anyhow::Result<Box<dyn StatusUnit>> + Send + Sync>;

/// Where a unit's code was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    /// User-supplied override.
    Override,
    /// Unit bundled with the application.
    Bundled,
}

impl fmt::Display for UnitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitSource::Override => "user overrides",
            UnitSource::Bundled => "bundled units",
        })
    }
}

/// Two-tier lookup table of unit constructors.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    overrides: HashMap<String, UnitFactory>,
    builtins: HashMap<String, UnitFactory>,
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overrides: Vec<_> = self.overrides.keys().collect();
        let mut builtins: Vec<_> = self.builtins.keys().collect();
        overrides.sort();
        builtins.sort();
        f.debug_struct("UnitRegistry")
            .field("overrides", &overrides)
            .field("builtins", &builtins)
            .finish()
    }
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundled unit.
    pub fn with_builtin<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(UnitContext) -> anyhow::Result<Box<dyn StatusUnit>> + Send + Sync + 'static,
    {
        self.builtins.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Register a user override; it shadows a bundled unit of the same name.
    pub fn with_override<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(UnitContext) -> anyhow::Result<Box<dyn StatusUnit>> + Send + Sync + 'static,
    {
        self.overrides.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Find the constructor for a unit name: overrides first, then built-ins.
    pub fn resolve(&self, name: &str) -> Result<(UnitSource, UnitFactory)> {
        if let Some(f) = self.overrides.get(name) {
            return Ok((UnitSource::Override, Arc::clone(f)));
        }
        if let Some(f) = self.builtins.get(name) {
            return Ok((UnitSource::Bundled, Arc::clone(f)));
        }
        Err(EngineError::UnitNotFound(name.to_string()))
    }

    /// Resolve, validate universal options and construct the unit.
    ///
    /// Universal options are checked before the constructor runs, so a bad
    /// option never produces a half-configured instance.
    pub fn load(
        &self,
        ctx: UnitContext,
        raw: &UnitOptionMap,
    ) -> Result<(Box<dyn StatusUnit>, UniversalOptions)> {
        let id: UnitId = ctx.id.clone();
        let (source, factory) = self.resolve(id.name())?;
        let universal = UniversalOptions::from_config(&id, raw)?;

        info!(unit = %id, from = %source, "loading unit");

        let unit = factory(ctx).with_context(|| format!("constructing unit '{id}'"))?;
        Ok((unit, universal))
    }
}
