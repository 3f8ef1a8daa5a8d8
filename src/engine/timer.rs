// src/engine/timer.rs

//! Generation-stamped one-shot timer slot.
//!
//! A unit owns exactly one slot. Every `arm` bumps the generation and hands
//! out a [`TimerTicket`]; a ticket from an older arm can neither fire nor
//! cancel the current one. Closing the slot is permanent.

use tokio::time::Instant;

/// Identifies one arm of a [`TimerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket(u64);

#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    due: Option<Instant>,
    closed: bool,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `due`, replacing any pending arm. `None` once closed.
    pub fn arm(&mut self, due: Instant) -> Option<TimerTicket> {
        if self.closed {
            return None;
        }
        self.generation += 1;
        self.due = Some(due);
        Some(TimerTicket(self.generation))
    }

    /// Cancel only if `ticket` is still the current arm. Idempotent.
    pub fn cancel_ticket(&mut self, ticket: TimerTicket) -> bool {
        if ticket.0 == self.generation && self.due.is_some() {
            self.due = None;
            true
        } else {
            false
        }
    }

    /// Consume the arm identified by `ticket`; `false` for stale tickets.
    pub fn fire(&mut self, ticket: TimerTicket) -> bool {
        if !self.closed && ticket.0 == self.generation && self.due.is_some() {
            self.due = None;
            true
        } else {
            false
        }
    }

    /// Pending deadline and the ticket that owns it.
    pub fn next(&self) -> Option<(Instant, TimerTicket)> {
        self.due.map(|due| (due, TimerTicket(self.generation)))
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Cancel and refuse every later arm.
    pub fn close(&mut self) {
        self.closed = true;
        self.due = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
