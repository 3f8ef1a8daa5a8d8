// src/isolator.rs

//! Failure isolation for unit callables.
//!
//! Every producer and handler invocation goes through [`invoke`], which
//! turns errors and panics into a [`Fault`]. Faults are handed to the
//! [`FailureIsolator`] of the owning unit, which rate-limits escalation:
//! only the first failure after a success carries `notify_user = true`.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::collab::{FailureReport, Reporter};
use crate::errors::ContractViolation;
use crate::unit::{Args, StatusUnit, UnitId};

/// Why an invocation did not produce a usable result.
#[derive(Debug, Error)]
pub enum Fault {
    /// The callable returned an error.
    #[error("{0:#}")]
    Runtime(anyhow::Error),
    /// The callable panicked.
    #[error("panicked: {0}")]
    Panic(String),
    /// The callable returned something that is not a valid record.
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

/// Call a unit method with panics contained.
pub fn invoke(unit: &mut dyn StatusUnit, method: &str, args: Args<'_>) -> Result<Value, Fault> {
    match catch_unwind(AssertUnwindSafe(|| unit.call(method, args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Fault::Runtime(err)),
        Err(panic) => Err(Fault::Panic(panic_message(panic.as_ref()))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Per-unit fault reporting state.
#[derive(Debug, Default)]
pub struct FailureIsolator {
    nagged: bool,
}

impl FailureIsolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the user has already been told about the current failure run.
    pub fn nagged(&self) -> bool {
        self.nagged
    }

    /// Report a fault; escalates only if nothing was escalated since the
    /// last success.
    pub fn record_failure(
        &mut self,
        reporter: &dyn Reporter,
        unit: &UnitId,
        producer: &str,
        fault: &Fault,
    ) {
        let notify_user = !self.nagged;
        self.nagged = true;

        warn!(
            unit = %unit,
            producer,
            error = %fault,
            escalated = notify_user,
            "unit method failed"
        );

        let report = FailureReport {
            unit: unit.clone(),
            producer: producer.to_string(),
            message: format!("Instance `{unit}`, user method `{producer}` failed: {fault}"),
            notify_user,
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| reporter.report(report))) {
            debug!(
                unit = %unit,
                panic = %panic_message(panic.as_ref()),
                "failure reporter panicked; report dropped"
            );
        }
    }

    /// Forget earlier failures so the next one escalates again.
    pub fn record_success(&mut self) {
        self.nagged = false;
    }
}
