// src/engine/py3.rs

//! Capability handle given to every unit at construction.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::collab::{Clock, NotifyLevel, Reporter};
use crate::errors::{EngineError, Result};
use crate::record::CACHE_FOREVER;
use crate::unit::UnitId;

use super::handle::{UnitCommand, UnitDirectory, UnitHandle};

/// Lets a unit reach back into the engine: force updates, poke other units,
/// notify the user and compute cache deadlines.
#[derive(Clone)]
pub struct Py3 {
    id: UnitId,
    tx: mpsc::UnboundedSender<UnitCommand>,
    directory: UnitDirectory,
    reporter: Arc<dyn Reporter>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Py3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Py3").field("unit", &self.id).finish_non_exhaustive()
    }
}

impl Py3 {
    /// `cached_until` value meaning "do not reschedule automatically".
    pub const CACHE_FOREVER: f64 = CACHE_FOREVER;

    pub(crate) fn new(
        id: UnitId,
        tx: mpsc::UnboundedSender<UnitCommand>,
        directory: UnitDirectory,
        reporter: Arc<dyn Reporter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id,
            tx,
            directory,
            reporter,
            clock,
        }
    }

    /// Identity of the owning unit.
    pub fn unit_id(&self) -> &UnitId {
        &self.id
    }

    /// Current engine time, Unix seconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Absolute `cached_until` value `seconds` from now.
    pub fn time_in(&self, seconds: f64) -> f64 {
        self.clock.now() + seconds
    }

    /// Force an update of the owning unit.
    pub fn update(&self) -> Result<()> {
        self.tx
            .send(UnitCommand::ForceUpdate)
            .map_err(|_| EngineError::UnitGone(self.id.full_name().to_string()))
    }

    /// Force an update of another loaded unit.
    pub fn update_unit(&self, full_name: &str) -> Result<()> {
        self.directory.require(full_name)?.force_update()
    }

    /// Handle of another loaded unit, if any.
    pub fn unit(&self, full_name: &str) -> Option<UnitHandle> {
        self.directory.get(full_name)
    }

    /// Deliver a click event to a named unit.
    pub fn trigger_event(&self, full_name: &str, event: Value) -> Result<()> {
        self.directory.require(full_name)?.click(event)
    }

    /// Send a notification to the user through the reporter.
    pub fn notify_user(&self, message: &str, level: NotifyLevel) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.reporter.notify_user(message, level)
        }));
        if outcome.is_err() {
            debug!(unit = %self.id, "reporter panicked while notifying user");
        }
    }
}
