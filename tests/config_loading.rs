// tests/config_loading.rs

use std::error::Error;
use std::fs;

use barengine::EngineError;
use barengine::config::{load_and_validate, load_from_str};
use barengine::logging::LogLevel;
use barengine::scheduler::CacheSettings;
use barengine_test_utils::builders::ConfigFileBuilder;
use serde_json::json;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const FULL_CONFIG: &str = r##"
[engine]
cache_timeout = 30
minimum_interval = 0.5
log_level = "debug"

[general]
color_good = "#00FF00"
interval = 5

[unit."vpn_status home"]
separator = false
format = "VPN: {name}"

[unit.clock]
align = "right"
"##;

#[test]
fn loads_a_complete_config_file() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("barengine.toml");
    fs::write(&path, FULL_CONFIG)?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.engine.cache_timeout, 30.0);
    assert_eq!(cfg.engine.minimum_interval, 0.5);
    assert_eq!(cfg.engine.log_level, Some(LogLevel::Debug));
    assert_eq!(cfg.general.get("color_good"), Some(&json!("#00FF00")));

    let vpn = cfg.unit_options("vpn_status home");
    assert_eq!(vpn.get("separator"), Some(&json!(false)));
    assert_eq!(vpn.get("format"), Some(&json!("VPN: {name}")));
    assert_eq!(cfg.unit_options("clock").get("align"), Some(&json!("right")));
    assert!(cfg.unit_options("not_configured").is_empty());

    let settings = CacheSettings::from(&cfg.engine);
    assert_eq!(settings.cache_timeout, 30.0);
    Ok(())
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let raw = load_from_str("")?;
    assert_eq!(raw.engine.cache_timeout, 60.0);
    assert_eq!(raw.engine.minimum_interval, 0.1);
    assert!(raw.engine.log_level.is_none());
    assert!(raw.general.is_empty());
    assert!(raw.unit.is_empty());
    Ok(())
}

#[test]
fn non_positive_cache_timeout_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[engine]\ncache_timeout = 0\n")?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, EngineError::ConfigError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn negative_minimum_interval_is_rejected() -> TestResult {
    let raw = load_from_str("[engine]\nminimum_interval = -1.0\n")?;
    let err = barengine::ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, EngineError::ConfigError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = load_from_str("[engine\ncache_timeout = ").unwrap_err();
    assert!(matches!(err, EngineError::TomlError(_)), "got {err:?}");
}

#[test]
fn missing_file_is_an_io_error() -> TestResult {
    let dir = TempDir::new()?;
    let err = load_and_validate(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, EngineError::IoError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn builder_produces_validated_config() {
    let cfg = ConfigFileBuilder::new()
        .cache_timeout(5.0)
        .minimum_interval(0.0)
        .with_general("color_bad", json!("#FF0000"))
        .with_unit_option("static_text", "format", json!("hi"))
        .build();

    assert_eq!(cfg.engine.cache_timeout, 5.0);
    assert_eq!(cfg.unit_options("static_text").get("format"), Some(&json!("hi")));
}
