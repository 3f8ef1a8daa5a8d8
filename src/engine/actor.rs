// src/engine/actor.rs

//! # UnitActor: one sequential worker per unit.
//!
//! The actor owns a [`UnitCore`] and its [`TimerSlot`]. It is dormant
//! between runs and wakes for exactly three reasons:
//!
//! ```text
//! loop {
//!   select (biased) {
//!     ready gate cancelled ──► terminate, exit
//!     command              ──► ForceUpdate | Sleep | Wake | Click | Terminate
//!     timer fired (ticket) ──► run cycle if the ticket is still current
//!   }
//! }
//! ```
//!
//! ## Rules
//! - Commands and timer firings are handled one at a time, so lifecycle
//!   operations never race a run cycle of the same unit.
//! - Unit code runs on the blocking pool; a slow producer delays only its
//!   own unit.
//! - A forced update runs even while sleeping; the cycle then arms nothing.
//! - After termination the slot is closed and nothing is ever re-armed.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, trace};

use crate::scheduler::{EngineContext, Schedule, UnitCore, UnitState, describe_panic};

use super::handle::UnitCommand;
use super::timer::{TimerSlot, TimerTicket};

pub(crate) struct UnitActor {
    core: Option<UnitCore>,
    rx: mpsc::UnboundedReceiver<UnitCommand>,
    timer: TimerSlot,
    /// Ticket of the arm this actor is waiting on.
    armed: Option<TimerTicket>,
    ctx: EngineContext,
    name: String,
}

impl UnitActor {
    pub(crate) fn new(
        core: UnitCore,
        rx: mpsc::UnboundedReceiver<UnitCommand>,
        ctx: EngineContext,
    ) -> Self {
        let name = core.id().full_name().to_string();
        Self {
            core: Some(core),
            rx,
            timer: TimerSlot::new(),
            armed: None,
            ctx,
            name,
        }
    }

    /// Runs until terminated, the ready gate closes, or every handle is gone.
    pub(crate) async fn run(mut self) {
        info!(unit = %self.name, "unit worker started");

        // First cycle runs immediately: every producer starts out due.
        self.apply(Schedule::After(Duration::ZERO));

        let gate = self.ctx.gate.clone();
        loop {
            let next = self.timer.next();

            tokio::select! {
                biased;

                _ = gate.cancelled() => {
                    debug!(unit = %self.name, "ready gate closed");
                    break;
                }

                cmd = self.rx.recv() => match cmd {
                    Some(UnitCommand::Terminate) | None => break,
                    Some(cmd) => {
                        if !self.handle(cmd).await {
                            break;
                        }
                    }
                },

                ticket = wait_for(next) => {
                    let fired = self.timer.fire(ticket);
                    if fired {
                        self.armed = None;
                    }
                    if fired && !self.run_cycle().await {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        info!(unit = %self.name, "unit worker stopped");
    }

    /// Returns `false` once the core has been lost.
    async fn handle(&mut self, cmd: UnitCommand) -> bool {
        trace!(unit = %self.name, ?cmd, "unit command");
        match cmd {
            UnitCommand::ForceUpdate => {
                let now = self.ctx.clock.now();
                let Some(core) = self.core.as_mut() else {
                    return false;
                };
                core.force_update(now);
                if core.state() == UnitState::Sleeping {
                    debug!(unit = %self.name, "forced update while sleeping; no re-arm afterwards");
                }
                self.run_cycle().await
            }
            UnitCommand::Sleep => {
                if let Some(core) = self.core.as_mut() {
                    core.sleep();
                }
                self.disarm();
                debug!(unit = %self.name, "unit sleeping");
                true
            }
            UnitCommand::Wake => {
                let now = self.ctx.clock.now();
                let Some(core) = self.core.as_mut() else {
                    return false;
                };
                let schedule = core.wake(now);
                debug!(unit = %self.name, ?schedule, "unit woken");
                self.apply(schedule);
                true
            }
            UnitCommand::Click(event) => self
                .with_core(move |core, ctx| {
                    core.click(&event, ctx);
                })
                .await
                .is_some(),
            UnitCommand::Terminate => false,
        }
    }

    async fn run_cycle(&mut self) -> bool {
        self.disarm();
        match self.with_core(|core, ctx| core.run_cycle(ctx)).await {
            Some(report) => {
                self.apply(report.schedule);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, schedule: Schedule) {
        match schedule {
            Schedule::After(delay) => {
                let due = Instant::now()
                    .checked_add(delay)
                    .unwrap_or_else(Instant::now);
                self.disarm();
                self.armed = self.timer.arm(due);
                if self.armed.is_some() {
                    trace!(unit = %self.name, ?delay, "timer armed");
                }
            }
            Schedule::Quiescent => {
                self.disarm();
                debug!(unit = %self.name, "cache forever; no timer armed");
            }
            Schedule::Suspended | Schedule::Idle => self.disarm(),
        }
    }

    /// Cancel the arm this actor owns; a newer arm is never touched.
    fn disarm(&mut self) {
        if let Some(ticket) = self.armed.take() {
            if self.timer.cancel_ticket(ticket) {
                trace!(unit = %self.name, "timer cancelled");
            }
        }
    }

    /// Run `f` against the core on the blocking pool.
    async fn with_core<R, F>(&mut self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut UnitCore, &EngineContext) -> R + Send + 'static,
    {
        let mut core = self.core.take()?;
        let ctx = self.ctx.clone();
        match tokio::task::spawn_blocking(move || {
            let out = f(&mut core, &ctx);
            (core, out)
        })
        .await
        {
            Ok((core, out)) => {
                self.core = Some(core);
                Some(out)
            }
            Err(err) => {
                let reason = if err.is_panic() {
                    describe_panic(err.into_panic().as_ref())
                } else {
                    err.to_string()
                };
                error!(unit = %self.name, %reason, "unit worker lost its state");
                None
            }
        }
    }

    async fn shutdown(&mut self) {
        self.armed = None;
        self.timer.close();
        self.rx.close();
        if self.with_core(|core, ctx| core.terminate(ctx)).await.is_some() {
            debug!(unit = %self.name, "unit terminated");
        }
    }
}

async fn wait_for(next: Option<(Instant, TimerTicket)>) -> TimerTicket {
    match next {
        Some((due, ticket)) => {
            time::sleep_until(due).await;
            ticket
        }
        None => std::future::pending().await,
    }
}
