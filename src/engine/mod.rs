// src/engine/mod.rs

//! Async shell around the per-unit state machines.
//!
//! - [`actor`] runs one [`UnitCore`](crate::scheduler::UnitCore) per unit
//!   on its own task, driven by a [`timer::TimerSlot`] and commands.
//! - [`handle`] provides [`UnitHandle`] and the shared [`UnitDirectory`].
//! - [`py3`] is the capability handle units receive at construction.
//!
//! [`Engine`] ties them together: it loads units, owns the ready gate and
//! shuts every worker down.

pub mod actor;
pub mod handle;
pub mod py3;
pub mod timer;

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collab::{Aggregator, Clock, NoopAggregator, Reporter, TokioClock, TracingReporter};
use crate::config::ConfigFile;
use crate::errors::{EngineError, Result};
use crate::loader::UnitRegistry;
use crate::record::OutputRecord;
use crate::scheduler::{CacheSettings, EngineContext, UnitCore};
use crate::unit::{UnitContext, UnitId, UnitOptions};

pub use handle::{UnitCommand, UnitDirectory, UnitHandle};
pub use py3::Py3;
pub use timer::{TimerSlot, TimerTicket};

use actor::UnitActor;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: ConfigFile,
    registry: UnitRegistry,
    aggregator: Arc<dyn Aggregator>,
    reporter: Arc<dyn Reporter>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn registry(mut self, registry: UnitRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Engine {
        let ctx = EngineContext {
            clock: self.clock,
            aggregator: self.aggregator,
            reporter: self.reporter,
            general: Arc::new(self.config.general.clone()),
            settings: CacheSettings::from(&self.config.engine),
            gate: CancellationToken::new(),
        };
        Engine {
            ctx,
            config: self.config,
            registry: self.registry,
            directory: UnitDirectory::new(),
            workers: Mutex::new(Vec::new()),
        }
    }
}

/// Runs every loaded unit on its own worker.
pub struct Engine {
    ctx: EngineContext,
    config: ConfigFile,
    registry: UnitRegistry,
    directory: UnitDirectory,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("registry", &self.registry)
            .field("units", &self.directory.names())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder(config: ConfigFile) -> EngineBuilder {
        EngineBuilder {
            config,
            registry: UnitRegistry::new(),
            aggregator: Arc::new(NoopAggregator),
            reporter: Arc::new(TracingReporter),
            clock: Arc::new(TokioClock::new()),
        }
    }

    /// Load a unit by full name (`"name instance"`) and start its worker.
    ///
    /// The first run cycle starts immediately. Must be called from within a
    /// tokio runtime.
    pub fn load(&self, full_name: &str) -> Result<UnitHandle> {
        if !self.ctx.is_ready() {
            return Err(EngineError::ConfigError(format!(
                "cannot load unit '{full_name}': engine is shutting down"
            )));
        }

        let id = UnitId::parse(full_name);
        if id.name().is_empty() {
            return Err(EngineError::UnitNotFound(full_name.to_string()));
        }
        if self.directory.contains(id.full_name()) {
            return Err(EngineError::ConfigError(format!(
                "unit '{id}' is already loaded"
            )));
        }

        let raw = self.config.unit_options(id.full_name());
        let (tx, rx) = mpsc::unbounded_channel();
        let py3 = Py3::new(
            id.clone(),
            tx.clone(),
            self.directory.clone(),
            Arc::clone(&self.ctx.reporter),
            Arc::clone(&self.ctx.clock),
        );
        let unit_ctx = UnitContext {
            id: id.clone(),
            options: UnitOptions::from_config(&raw),
            py3,
        };

        let (unit, universal) = self.registry.load(unit_ctx, &raw)?;
        let core = UnitCore::new(id.clone(), unit, universal, self.ctx.clock.now());
        let handle = UnitHandle::new(id, tx, core.subscribe());

        if !self.directory.insert_if_absent(handle.clone()) {
            return Err(EngineError::ConfigError(format!(
                "unit '{}' is already loaded",
                handle.id()
            )));
        }

        let worker = tokio::spawn(UnitActor::new(core, rx, self.ctx.clone()).run());
        if let Ok(mut workers) = self.workers.lock() {
            workers.push(worker);
        }

        Ok(handle)
    }

    /// Load several units; failures are returned per unit and do not stop
    /// the others from loading.
    pub fn load_all<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(String, Result<UnitHandle>)> {
        names
            .into_iter()
            .map(|name| {
                let res = self.load(name);
                if let Err(err) = &res {
                    warn!(unit = name, error = %err, "unit failed to load");
                }
                (name.to_string(), res)
            })
            .collect()
    }

    pub fn unit(&self, full_name: &str) -> Option<UnitHandle> {
        self.directory.get(full_name)
    }

    pub fn units(&self) -> Vec<UnitHandle> {
        self.directory.handles()
    }

    /// Route a click event to the named unit.
    pub fn dispatch_click(&self, full_name: &str, event: Value) -> Result<()> {
        self.directory.require(full_name)?.click(event)
    }

    /// Latest output records of a unit, for the aggregator to pull.
    pub fn outputs(&self, full_name: &str) -> Option<Arc<Vec<OutputRecord>>> {
        self.directory.get(full_name).map(|h| h.latest())
    }

    /// Whether the ready gate is still open.
    pub fn is_ready(&self) -> bool {
        self.ctx.is_ready()
    }

    /// Close the ready gate, terminate every unit and wait for the workers.
    ///
    /// In-flight cycles stop before their next producer; teardown handlers
    /// run once each.
    pub async fn shutdown(&self) {
        info!("engine shutting down");
        self.ctx.gate.cancel();

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "unit worker ended abnormally");
            }
        }

        info!("engine stopped");
    }
}
