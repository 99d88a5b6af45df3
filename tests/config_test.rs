// ABOUTME: Integration tests for engine configuration defaults, overrides and validation
// ABOUTME: Environment-mutating tests run serially to avoid cross-test interference
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use rehab_sync_engine::config::{ConfigError, EngineConfig, Environment, RuntimeConfig};
use rehab_sync_engine::errors::{AppError, ErrorCode};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_defaults_are_valid() {
    common::init_test_logging();
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.sync.confirm_frames, 2);
    assert_eq!(config.sync.loop_after_ms, 3_000);
    assert_eq!(config.sync.max_wait_ms, 8_000);
    let weights =
        config.scoring.rom_weight + config.scoring.stability_weight + config.scoring.flow_weight;
    assert!((weights - 1.0).abs() < 1e-9);
}

#[test]
fn test_weights_must_sum_to_one() {
    let mut config = EngineConfig::default();
    config.scoring.rom_weight = 0.8;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidWeights(_))
    ));
}

#[test]
fn test_loop_must_not_exceed_skip() {
    let mut config = EngineConfig::default();
    config.sync.loop_after_ms = config.sync.max_wait_ms + 1;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(_))));
}

#[test]
fn test_out_of_order_thresholds_are_rejected() {
    let mut config = EngineConfig::default();
    config.pain.moderate_threshold = config.pain.severe_threshold;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(_))));

    let mut config = EngineConfig::default();
    config.calibration.min_clean_samples = config.calibration.min_samples + 1;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(_))));

    let mut config = EngineConfig::default();
    config.kinematics.min_visibility = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValueOutOfRange(_))
    ));
}

#[test]
fn test_config_error_maps_to_app_error() {
    let error = AppError::from(ConfigError::InvalidWeights("bad"));
    assert_eq!(error.code, ErrorCode::ConfigInvalid);
    assert!(error.message.contains("bad"));
}

#[test]
#[serial]
fn test_environment_overrides() {
    env::set_var("SYNC_MAX_WAIT_MS", "12000");
    env::set_var("DTW_REP_WINDOW", "45");
    env::set_var("KINEMATICS_USE_3D", "false");

    let config = EngineConfig::load().unwrap();
    assert_eq!(config.sync.max_wait_ms, 12_000);
    assert_eq!(config.dtw.rep_window, 45);
    assert!(!config.kinematics.use_3d);

    env::remove_var("SYNC_MAX_WAIT_MS");
    env::remove_var("DTW_REP_WINDOW");
    env::remove_var("KINEMATICS_USE_3D");
}

#[test]
#[serial]
fn test_unparseable_override_is_reported() {
    env::set_var("SYNC_CONFIRM_FRAMES", "three");
    let result = EngineConfig::load();
    env::remove_var("SYNC_CONFIRM_FRAMES");

    match result {
        Err(ConfigError::Parse(message)) => assert!(message.contains("SYNC_CONFIRM_FRAMES")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_override_that_breaks_validation_fails_load() {
    env::set_var("SYNC_LOOP_AFTER_MS", "20000");
    let result = EngineConfig::load();
    env::remove_var("SYNC_LOOP_AFTER_MS");

    assert!(matches!(result, Err(ConfigError::InvalidRange(_))));
}

#[test]
fn test_environment_parsing() {
    assert_eq!(Environment::from_str_or_default("prod"), Environment::Production);
    assert_eq!(Environment::from_str_or_default("TEST"), Environment::Testing);
    assert_eq!(Environment::from_str_or_default("anything"), Environment::Development);
    assert!(Environment::Production.is_production());
    assert_eq!(Environment::Testing.to_string(), "testing");
}

#[test]
#[serial]
fn test_runtime_config_from_env() {
    env::set_var("ENVIRONMENT", "production");
    env::set_var("PROFILE_DIR", "/tmp/rehab-profiles");
    env::set_var("PAIN_WORKER", "false");

    let runtime = RuntimeConfig::from_env().unwrap();

    env::remove_var("ENVIRONMENT");
    env::remove_var("PROFILE_DIR");
    env::remove_var("PAIN_WORKER");

    assert_eq!(runtime.environment, Environment::Production);
    assert_eq!(runtime.profile_dir, Some(PathBuf::from("/tmp/rehab-profiles")));
    assert!(!runtime.pain_worker);
    assert!(runtime.logging.include_location);
    assert!(runtime.engine.validate().is_ok());
}
