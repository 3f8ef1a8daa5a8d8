// src/engine/handle.rs

//! Handles used to talk to a running unit worker.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::errors::{EngineError, Result};
use crate::record::OutputRecord;
use crate::unit::UnitId;

/// Commands a unit worker accepts between run cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitCommand {
    ForceUpdate,
    Sleep,
    Wake,
    Click(Value),
    Terminate,
}

/// Cloneable handle to one unit worker.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    id: UnitId,
    tx: mpsc::UnboundedSender<UnitCommand>,
    outputs: watch::Receiver<Arc<Vec<OutputRecord>>>,
}

impl UnitHandle {
    pub(crate) fn new(
        id: UnitId,
        tx: mpsc::UnboundedSender<UnitCommand>,
        outputs: watch::Receiver<Arc<Vec<OutputRecord>>>,
    ) -> Self {
        Self { id, tx, outputs }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Make every producer due and run a cycle now.
    pub fn force_update(&self) -> Result<()> {
        self.send(UnitCommand::ForceUpdate)
    }

    pub fn sleep(&self) -> Result<()> {
        self.send(UnitCommand::Sleep)
    }

    pub fn wake(&self) -> Result<()> {
        self.send(UnitCommand::Wake)
    }

    /// Deliver a click event; the payload is forwarded untouched.
    pub fn click(&self, event: Value) -> Result<()> {
        self.send(UnitCommand::Click(event))
    }

    pub fn terminate(&self) -> Result<()> {
        self.send(UnitCommand::Terminate)
    }

    /// Last output of every producer, in discovery order.
    pub fn latest(&self) -> Arc<Vec<OutputRecord>> {
        Arc::clone(&self.outputs.borrow())
    }

    /// Whether the worker is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: UnitCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| EngineError::UnitGone(self.id.full_name().to_string()))
    }
}

/// Loaded units by full name, shared between the engine and every `Py3`.
#[derive(Debug, Clone, Default)]
pub struct UnitDirectory {
    inner: Arc<RwLock<BTreeMap<String, UnitHandle>>>,
}

impl UnitDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, full_name: &str) -> Option<UnitHandle> {
        self.inner
            .read()
            .ok()
            .and_then(|units| units.get(full_name).cloned())
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.get(full_name).is_some()
    }

    /// Register `handle` unless its full name is taken; check and insert
    /// happen under one write lock. Returns `false` when nothing was inserted.
    pub(crate) fn insert_if_absent(&self, handle: UnitHandle) -> bool {
        let Ok(mut units) = self.inner.write() else {
            return false;
        };
        match units.entry(handle.id().full_name().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|units| units.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn handles(&self) -> Vec<UnitHandle> {
        self.inner
            .read()
            .map(|units| units.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Look a unit up, failing with `UnitNotFound`.
    pub fn require(&self, full_name: &str) -> Result<UnitHandle> {
        self.get(full_name)
            .ok_or_else(|| EngineError::UnitNotFound(full_name.to_string()))
    }
}
