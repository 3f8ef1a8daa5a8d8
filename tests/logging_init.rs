// tests/logging_init.rs

use std::error::Error;

use barengine::ConfigFile;
use barengine::config::load_from_str;
use barengine::logging::init_logging_from;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn config_log_level_installs_the_subscriber_once() -> TestResult {
    let cfg = ConfigFile::try_from(load_from_str("[engine]\nlog_level = \"warn\"\n")?)?;

    init_logging_from(&cfg)?;
    tracing::warn!("logging initialised from config");

    assert!(init_logging_from(&cfg).is_err());
    Ok(())
}
