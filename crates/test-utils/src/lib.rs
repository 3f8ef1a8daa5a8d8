pub mod builders;
pub mod fakes;
pub mod scripted;

use std::sync::{Arc, Once};

use barengine::{CacheSettings, EngineContext};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use crate::fakes::{ManualClock, RecordingAggregator, RecordingReporter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// General display configuration used by legacy-convention tests.
pub fn general_config() -> Map<String, Value> {
    let mut general = Map::new();
    general.insert("color_good".into(), json!("#00FF00"));
    general.insert("color_bad".into(), json!("#FF0000"));
    general
}

/// Collaborators wired to a manual clock, for driving `UnitCore` directly.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub aggregator: Arc<RecordingAggregator>,
    pub reporter: Arc<RecordingReporter>,
    pub ctx: EngineContext,
}

impl Harness {
    /// Clock starts at `t = 0`.
    pub fn new(cache_timeout: f64, minimum_interval: f64) -> Self {
        let clock = Arc::new(ManualClock::new(0.0));
        let aggregator = Arc::new(RecordingAggregator::new());
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = EngineContext {
            clock: clock.clone(),
            aggregator: aggregator.clone(),
            reporter: reporter.clone(),
            general: Arc::new(general_config()),
            settings: CacheSettings {
                cache_timeout,
                minimum_interval,
            },
            gate: CancellationToken::new(),
        };
        Self {
            clock,
            aggregator,
            reporter,
            ctx,
        }
    }
}
