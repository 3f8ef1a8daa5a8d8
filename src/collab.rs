// src/collab.rs

//! Collaborators the engine talks to but does not own.
//!
//! - [`Aggregator`] merges unit output into the bar; it is told *that* a
//!   unit has fresh output and pulls the records itself.
//! - [`Reporter`] receives failure reports and user notifications.
//! - [`Clock`] is the single time source every deadline is compared against.
//!
//! All three are shared by every unit worker, so implementations must be
//! safe for concurrent use.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::unit::UnitId;

/// Receives fresh-output notifications.
pub trait Aggregator: Send + Sync + 'static {
    /// A unit has new output. One call per processed producer or click;
    /// treat every call as an independent notification.
    fn notify_update(&self, unit: &UnitId);

    /// The current aggregated bar, handed to legacy-convention callables.
    fn bar_output(&self) -> Vec<Value> {
        Vec::new()
    }
}

/// Aggregator that ignores notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAggregator;

impl Aggregator for NoopAggregator {
    fn notify_update(&self, _unit: &UnitId) {}
}

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        })
    }
}

/// A contained fault of one producer or handler.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub unit: UnitId,
    /// Producer or handler name.
    pub producer: String,
    pub message: String,
    /// First failure since the unit last succeeded; escalate to the user.
    pub notify_user: bool,
}

/// Receives failure reports and user notifications.
///
/// Best-effort: a panicking reporter is contained by the engine.
pub trait Reporter: Send + Sync + 'static {
    fn report(&self, report: FailureReport);

    fn notify_user(&self, message: &str, level: NotifyLevel);
}

/// Reporter writing everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: FailureReport) {
        if report.notify_user {
            error!(
                unit = %report.unit,
                producer = %report.producer,
                error = %report.message,
                "unit method failed"
            );
        } else {
            debug!(
                unit = %report.unit,
                producer = %report.producer,
                error = %report.message,
                "unit method failed again"
            );
        }
    }

    fn notify_user(&self, message: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info => info!(%message, "user notification"),
            NotifyLevel::Warning => warn!(%message, "user notification"),
            NotifyLevel::Error => error!(%message, "user notification"),
        }
    }
}

/// Time source, in Unix seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

/// Wall clock anchored once and advanced by tokio's monotonic clock.
///
/// Follows `tokio::time::pause`/`advance`, so timer tests run on virtual
/// time while deadlines stay comparable with wall-clock values.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    origin_unix: f64,
}

impl TokioClock {
    pub fn new() -> Self {
        let origin_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            origin: tokio::time::Instant::now(),
            origin_unix,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin_unix + self.origin.elapsed().as_secs_f64()
    }
}
