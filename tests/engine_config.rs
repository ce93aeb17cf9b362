//! Integration tests for engine configuration files.

use kiln_air::{ConfigError, Engine, EngineConfig, Strategy};
use std::fs;

#[test]
fn test_load_full_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.json");
    fs::write(
        &path,
        r#"{"default_strategy": "default", "cache_capacity": 128, "verify": true}"#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(
        config,
        EngineConfig::new().cache_capacity(Some(128)).verify(true)
    );

    let engine = Engine::new(config);
    assert_eq!(engine.pipeline().passes().names(), ["explicit_coercions", "verify"]);
}

#[test]
fn test_empty_object_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.json");
    fs::write(&path, "{}").unwrap();
    assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());
}

#[test]
fn test_default_strategy_is_used_by_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.json");
    fs::write(&path, r#"{"default_strategy": "remote-engine"}"#).unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.default_strategy, Strategy::from("remote-engine"));
    assert_eq!(
        Engine::new(config).config().default_strategy.as_str(),
        "remote-engine"
    );
}

#[test]
fn test_invalid_configs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.json");

    fs::write(&path, r#"{"default_strategy": ""}"#).unwrap();
    assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Invalid(_))));

    fs::write(&path, "not json").unwrap();
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("kiln.json"));
}
