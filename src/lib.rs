// src/lib.rs

//! # barengine
//!
//! Execution engine of a status-bar aggregator. It loads independently
//! written status units, runs each one on its own schedule, caches their
//! output per producer, and tells an aggregator whenever a unit has fresh
//! output.
//!
//! ```text
//! UnitRegistry ──► MethodTable ──► UnitCore ◄──── UnitActor (timer + commands)
//!  (loader)        (conventions)   (run cycle)        ▲
//!                                     │               │ force_update / sleep /
//!                                     ▼               │ wake / click / terminate
//!                          Aggregator / Reporter   UnitHandle, Py3
//! ```
//!
//! - [`unit`] defines the contract a status unit implements.
//! - [`registry`] classifies callables by calling convention.
//! - [`loader`] resolves unit names (overrides first, then bundled units).
//! - [`scheduler`] holds the synchronous per-unit state machine.
//! - [`engine`] runs one actor per unit and exposes [`Engine`].
//! - [`isolator`] contains faults and rate-limits their escalation.

pub mod collab;
pub mod config;
pub mod engine;
pub mod errors;
pub mod isolator;
pub mod loader;
pub mod logging;
pub mod options;
pub mod record;
pub mod registry;
pub mod scheduler;
pub mod unit;
pub mod units;

pub use collab::{
    Aggregator, Clock, FailureReport, NoopAggregator, NotifyLevel, Reporter, TokioClock,
    TracingReporter,
};
pub use config::{ConfigFile, load_and_validate};
pub use engine::{Engine, EngineBuilder, Py3, UnitHandle};
pub use errors::{ContractViolation, EngineError, Result};
pub use loader::{UnitRegistry, UnitSource};
pub use record::{CACHE_FOREVER, Deadline, OutputRecord};
pub use scheduler::{CacheSettings, EngineContext, Schedule, UnitCore, UnitState};
pub use unit::{Args, CallShape, Convention, LegacyArgs, MethodSpec, StatusUnit, UnitContext, UnitId, UnitOptions};
