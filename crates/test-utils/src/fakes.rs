use std::sync::Mutex;
use std::time::Duration;

use barengine::{Aggregator, Clock, FailureReport, NotifyLevel, Reporter, UnitId};
use serde_json::Value;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: f64) {
        *self.now.lock().unwrap() = t;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap() += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

/// Aggregator that records every fresh-output notification.
#[derive(Debug, Default)]
pub struct RecordingAggregator {
    updates: Mutex<Vec<UnitId>>,
    bar: Mutex<Vec<Value>>,
}

impl RecordingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what `bar_output` returns.
    pub fn set_bar(&self, bar: Vec<Value>) {
        *self.bar.lock().unwrap() = bar;
    }

    pub fn updates(&self) -> Vec<UnitId> {
        self.updates.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn count_for(&self, full_name: &str) -> usize {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.full_name() == full_name)
            .count()
    }

    /// Poll until at least `n` notifications arrived for `full_name`.
    pub async fn wait_for(&self, full_name: &str, n: usize) {
        while self.count_for(full_name) < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Aggregator for RecordingAggregator {
    fn notify_update(&self, unit: &UnitId) {
        self.updates.lock().unwrap().push(unit.clone());
    }

    fn bar_output(&self) -> Vec<Value> {
        self.bar.lock().unwrap().clone()
    }
}

/// Reporter that records failure reports and user notifications.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<FailureReport>>,
    notifications: Mutex<Vec<(String, NotifyLevel)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }

    /// `notify_user` flags of every report, in order.
    pub fn escalations(&self) -> Vec<bool> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.notify_user)
            .collect()
    }

    pub fn notifications(&self) -> Vec<(String, NotifyLevel)> {
        self.notifications.lock().unwrap().clone()
    }

    pub async fn wait_for_reports(&self, n: usize) {
        while self.reports.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, report: FailureReport) {
        self.reports.lock().unwrap().push(report);
    }

    fn notify_user(&self, message: &str, level: NotifyLevel) {
        self.notifications
            .lock()
            .unwrap()
            .push((message.to_string(), level));
    }
}

/// Aggregator whose every call panics.
#[derive(Debug, Default)]
pub struct PanickingAggregator;

impl Aggregator for PanickingAggregator {
    fn notify_update(&self, unit: &UnitId) {
        panic!("aggregator exploded on {unit}");
    }

    fn bar_output(&self) -> Vec<Value> {
        panic!("aggregator exploded reading the bar");
    }
}
