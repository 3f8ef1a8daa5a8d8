// src/scheduler.rs

//! Per-unit scheduling state machine.
//!
//! [`UnitCore`] owns everything about one loaded unit: its producers and
//! their cache deadlines, the last output of each, the sleeping flag and the
//! failure isolator. It is synchronous and deterministic given a [`Clock`],
//! so the whole cache/rescheduling contract is testable without timers.
//!
//! The async shell (`engine::actor`) turns the [`Schedule`] returned by each
//! operation into an armed or cancelled timer.
//!
//! ## Run cycle
//! ```text
//! gate closed? ──► Idle
//! for producer in discovery order:
//!   ├─ gate closed ──► stop
//!   ├─ not due     ──► track deadline, skip
//!   └─ due         ──► invoke (isolated)
//!         ├─ Ok  ──► stamp name/instance, overlay options,
//!         │          deadline = cached_until | now + cache_timeout,
//!         │          store, publish, notify aggregator
//!         └─ Err ──► report (rate-limited),
//!                    deadline = now + cache_timeout
//! next = min(tracked) | now + cache_timeout
//!   ├─ cache forever ──► Quiescent
//!   ├─ sleeping      ──► Suspended
//!   └─ otherwise     ──► After(max(next - now, minimum_interval))
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::collab::{Aggregator, Clock, Reporter};
use crate::config::EngineSection;
use crate::isolator::{FailureIsolator, Fault, invoke, panic_message};
use crate::options::UniversalOptions;
use crate::record::{Deadline, OutputRecord, normalize_response, track_earliest};
use crate::registry::{CLICK_HANDLER, MethodTable, TEARDOWN_HANDLER};
use crate::unit::{Args, Convention, LegacyArgs, StatusUnit, UnitId};

/// Longest delay ever handed to a timer.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Timing knobs shared by every unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    /// Default cache duration, seconds.
    pub cache_timeout: f64,
    /// Floor for automatically armed wake-ups, seconds.
    pub minimum_interval: f64,
}

impl From<&EngineSection> for CacheSettings {
    fn from(engine: &EngineSection) -> Self {
        Self {
            cache_timeout: engine.cache_timeout,
            minimum_interval: engine.minimum_interval,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings::from(&EngineSection::default())
    }
}

/// Collaborators and shared state every unit worker reads.
#[derive(Clone)]
pub struct EngineContext {
    pub clock: Arc<dyn Clock>,
    pub aggregator: Arc<dyn Aggregator>,
    pub reporter: Arc<dyn Reporter>,
    /// General display configuration for legacy callables.
    pub general: Arc<Map<String, Value>>,
    pub settings: CacheSettings,
    /// Ready gate: cancelled once the engine shuts down.
    pub gate: CancellationToken,
}

impl EngineContext {
    pub fn is_ready(&self) -> bool {
        !self.gate.is_cancelled()
    }

    fn default_deadline(&self, now: f64) -> Deadline {
        Deadline::At(now + self.settings.cache_timeout)
    }

    /// Current bar output; empty if the aggregator panics.
    fn bar_output(&self, unit: &UnitId) -> Vec<Value> {
        catch_unwind(AssertUnwindSafe(|| self.aggregator.bar_output())).unwrap_or_else(|panic| {
            warn!(
                unit = %unit,
                panic = %panic_message(panic.as_ref()),
                "aggregator panicked reading bar output"
            );
            Vec::new()
        })
    }

    /// Tell the aggregator `unit` has fresh output. A panic is logged and dropped.
    fn notify_update(&self, unit: &UnitId) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.aggregator.notify_update(unit)))
        {
            warn!(
                unit = %unit,
                panic = %panic_message(panic.as_ref()),
                "aggregator panicked on update notification"
            );
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("settings", &self.settings)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Sleeping,
    Terminated,
}

/// What the timer should do after an operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Arm a one-shot timer.
    After(Duration),
    /// Cache forever: stay idle until forced or updated externally.
    Quiescent,
    /// Sleeping: keep deadlines, arm nothing.
    Suspended,
    /// Gate closed or unit terminated: arm nothing.
    Idle,
}

/// Outcome of one run cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Producers invoked this cycle, in order.
    pub invoked: Vec<String>,
    /// Producers that faulted this cycle.
    pub failed: Vec<String>,
    pub schedule: Schedule,
}

impl CycleReport {
    fn idle() -> Self {
        Self {
            invoked: Vec::new(),
            failed: Vec::new(),
            schedule: Schedule::Idle,
        }
    }
}

/// One update source of a unit.
#[derive(Debug, Clone)]
pub struct Producer {
    pub name: String,
    pub convention: Convention,
    pub cached_until: Deadline,
    pub last_output: OutputRecord,
}

/// A loaded unit and all of its mutable scheduling state.
pub struct UnitCore {
    id: UnitId,
    unit: Box<dyn StatusUnit>,
    options: UniversalOptions,
    producers: Vec<Producer>,
    click: Option<Convention>,
    teardown: Option<Convention>,
    state: UnitState,
    isolator: FailureIsolator,
    cache_time: Option<Deadline>,
    outputs: watch::Sender<Arc<Vec<OutputRecord>>>,
}

impl std::fmt::Debug for UnitCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCore")
            .field("id", &self.id)
            .field("producers", &self.producers)
            .field("click", &self.click)
            .field("teardown", &self.teardown)
            .field("state", &self.state)
            .field("cache_time", &self.cache_time)
            .finish_non_exhaustive()
    }
}

impl UnitCore {
    /// Discover the unit's callables; every producer starts due at `now`.
    pub fn new(
        id: UnitId,
        unit: Box<dyn StatusUnit>,
        options: UniversalOptions,
        now: f64,
    ) -> Self {
        let table = MethodTable::discover(&id, unit.methods());
        let producers = table
            .producers
            .into_iter()
            .map(|(name, convention)| Producer {
                last_output: OutputRecord::placeholder(&name),
                name,
                convention,
                cached_until: Deadline::At(now),
            })
            .collect::<Vec<_>>();

        let (outputs, _) = watch::channel(Arc::new(
            producers.iter().map(|p| p.last_output.clone()).collect(),
        ));

        Self {
            id,
            unit,
            options,
            producers,
            click: table.click,
            teardown: table.teardown,
            state: UnitState::Active,
            isolator: FailureIsolator::new(),
            cache_time: None,
            outputs,
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn producers(&self) -> &[Producer] {
        &self.producers
    }

    pub fn producer(&self, name: &str) -> Option<&Producer> {
        self.producers.iter().find(|p| p.name == name)
    }

    pub fn click_convention(&self) -> Option<Convention> {
        self.click
    }

    pub fn teardown_convention(&self) -> Option<Convention> {
        self.teardown
    }

    /// Aggregate deadline computed by the last cycle.
    pub fn cache_time(&self) -> Option<Deadline> {
        self.cache_time
    }

    /// Whether a failure has been escalated since the last success.
    pub fn nagged(&self) -> bool {
        self.isolator.nagged()
    }

    /// Last output of every producer, in discovery order.
    pub fn latest(&self) -> Vec<OutputRecord> {
        self.producers.iter().map(|p| p.last_output.clone()).collect()
    }

    /// Receiver following [`latest`](Self::latest) across cycles.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<OutputRecord>>> {
        self.outputs.subscribe()
    }

    /// Run every due producer once and work out the next wake-up.
    pub fn run_cycle(&mut self, ctx: &EngineContext) -> CycleReport {
        if self.state == UnitState::Terminated || !ctx.is_ready() {
            trace!(unit = %self.id, "engine not ready; skipping run cycle");
            return CycleReport::idle();
        }

        let mut report = CycleReport::idle();
        let mut cache_time: Option<Deadline> = None;
        let mut bar: Option<Vec<Value>> = None;

        for idx in 0..self.producers.len() {
            if !ctx.is_ready() {
                debug!(unit = %self.id, "ready gate closed mid-cycle; aborting");
                break;
            }

            let now = ctx.clock.now();
            let (name, convention, cached_until) = {
                let p = &self.producers[idx];
                (p.name.clone(), p.convention, p.cached_until)
            };

            if !cached_until.is_due(now) {
                cache_time = track_earliest(cache_time, cached_until);
                continue;
            }

            report.invoked.push(name.clone());
            let outcome = {
                let args = match convention {
                    Convention::New => Args::None,
                    Convention::Legacy => Args::Legacy(LegacyArgs {
                        bar: bar.get_or_insert_with(|| ctx.bar_output(&self.id)),
                        general: &ctx.general,
                    }),
                };
                invoke(self.unit.as_mut(), &name, args)
                    .and_then(|value| normalize_response(value).map_err(Fault::from))
            };

            let now = ctx.clock.now();
            let deadline = match outcome {
                Ok(normalized) => {
                    let mut record = normalized.record;
                    record.insert("name".into(), Value::from(self.id.name()));
                    record.insert("instance".into(), Value::from(self.id.instance()));
                    self.options.apply(&mut record);

                    let deadline = normalized
                        .cached_until
                        .unwrap_or_else(|| ctx.default_deadline(now));

                    trace!(unit = %self.id, producer = %name, ?record, "producer returned");

                    let producer = &mut self.producers[idx];
                    producer.last_output = OutputRecord::from_map(record);
                    producer.cached_until = deadline;

                    self.publish();
                    ctx.notify_update(&self.id);
                    deadline
                }
                Err(fault) => {
                    self.isolator
                        .record_failure(ctx.reporter.as_ref(), &self.id, &name, &fault);
                    report.failed.push(name.clone());

                    let deadline = ctx.default_deadline(now);
                    self.producers[idx].cached_until = deadline;
                    deadline
                }
            };
            cache_time = track_earliest(cache_time, deadline);
        }

        if report.failed.is_empty() && !report.invoked.is_empty() {
            self.isolator.record_success();
        }

        let now = ctx.clock.now();
        let next = cache_time.unwrap_or_else(|| ctx.default_deadline(now));
        self.cache_time = Some(next);
        report.schedule = self.schedule_for(next, now, ctx.settings.minimum_interval);

        debug!(
            unit = %self.id,
            invoked = ?report.invoked,
            failed = ?report.failed,
            schedule = ?report.schedule,
            "run cycle finished"
        );

        report
    }

    fn schedule_for(&self, next: Deadline, now: f64, floor: f64) -> Schedule {
        match next {
            Deadline::Forever => Schedule::Quiescent,
            Deadline::At(_) if self.state == UnitState::Sleeping => Schedule::Suspended,
            Deadline::At(t) => Schedule::After(delay_secs((t - now).max(floor))),
        }
    }

    /// Make every producer due now. The caller runs the cycle.
    pub fn force_update(&mut self, now: f64) {
        for producer in &mut self.producers {
            producer.cached_until = Deadline::At(now);
            trace!(unit = %self.id, producer = %producer.name, "clearing cache");
        }
        if self.cache_time.is_some() {
            self.cache_time = Some(Deadline::At(now));
        }
    }

    /// Suspend automatic runs; cache state is left untouched.
    pub fn sleep(&mut self) {
        if self.state == UnitState::Active {
            self.state = UnitState::Sleeping;
        }
    }

    /// Resume automatic runs from the stored aggregate deadline.
    pub fn wake(&mut self, now: f64) -> Schedule {
        match self.state {
            UnitState::Terminated => return Schedule::Idle,
            UnitState::Sleeping | UnitState::Active => self.state = UnitState::Active,
        }
        match self.cache_time {
            Some(Deadline::Forever) => Schedule::Quiescent,
            Some(Deadline::At(t)) => Schedule::After(delay_secs((t - now).max(0.0))),
            None => Schedule::After(Duration::ZERO),
        }
    }

    /// Route a click event to the click handler, then signal fresh output.
    ///
    /// Returns `false` when the unit has no click handler (or is terminated).
    pub fn click(&mut self, event: &Value, ctx: &EngineContext) -> bool {
        let Some(convention) = self.click else {
            debug!(unit = %self.id, "unit has no click handler; event dropped");
            return false;
        };
        if self.state == UnitState::Terminated {
            return false;
        }

        let result = match convention {
            Convention::New => invoke(self.unit.as_mut(), CLICK_HANDLER, Args::Event(event)),
            Convention::Legacy => {
                let bar = ctx.bar_output(&self.id);
                let legacy = LegacyArgs {
                    bar: &bar,
                    general: &ctx.general,
                };
                invoke(self.unit.as_mut(), CLICK_HANDLER, Args::LegacyEvent(legacy, event))
            }
        };

        if let Err(fault) = result {
            self.isolator
                .record_failure(ctx.reporter.as_ref(), &self.id, CLICK_HANDLER, &fault);
        }

        ctx.notify_update(&self.id);
        true
    }

    /// Stop the unit for good, running its teardown handler once.
    ///
    /// Teardown faults are discarded.
    pub fn terminate(&mut self, ctx: &EngineContext) {
        if self.state == UnitState::Terminated {
            return;
        }
        self.state = UnitState::Terminated;

        let Some(convention) = self.teardown else {
            return;
        };

        let bar;
        let args = match convention {
            Convention::New => Args::None,
            Convention::Legacy => {
                bar = ctx.bar_output(&self.id);
                Args::Legacy(LegacyArgs {
                    bar: &bar,
                    general: &ctx.general,
                })
            }
        };

        if let Err(fault) = invoke(self.unit.as_mut(), TEARDOWN_HANDLER, args) {
            debug!(unit = %self.id, error = %fault, "teardown failed; ignored");
        }
    }

    fn publish(&self) {
        self.outputs.send_replace(Arc::new(self.latest()));
    }
}

fn delay_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}

/// Describe a panic payload; shared with the actor shell.
pub(crate) fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    panic_message(panic)
}
