// ABOUTME: Integration tests for Safe-Max calibration
// ABOUTME: Covers spike rejection, sample-count failures and the timed per-joint window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{approx, pose_with_shoulder_angle};
use rehab_sync_engine::config::CalibrationConfig;
use rehab_sync_engine::errors::ErrorCode;
use rehab_sync_engine::intelligence::{CalibrationEngine, CalibrationOutcome, KinematicsEngine};
use rehab_sync_engine::models::{CalibrationState, JointType, UserProfile};

fn idle_engine() -> CalibrationEngine {
    CalibrationEngine::new(CalibrationConfig::default(), KinematicsEngine::default())
}

fn small_window() -> CalibrationConfig {
    CalibrationConfig {
        min_samples: 10,
        min_clean_samples: 5,
        ..CalibrationConfig::default()
    }
}

#[test]
fn test_single_spike_does_not_set_the_max() {
    let samples = [90.0, 95.0, 100.0, 150.0, 95.0, 100.0, 98.0, 102.0, 97.0, 99.0];
    let calibration =
        CalibrationEngine::calibrate_samples(JointType::LeftShoulder, &samples, &small_window())
            .unwrap();

    assert!(calibration.max_angle < 150.0);
    assert!(approx(calibration.max_angle, 100.0, 1e-9));
    assert!(calibration.min_angle <= calibration.max_angle);
    assert!((0.0..=1.0).contains(&calibration.confidence));
    assert_eq!(calibration.num_samples, samples.len());
    assert_eq!(calibration.state, CalibrationState::Completed);
}

#[test]
fn test_too_few_samples_fails() {
    let err = CalibrationEngine::calibrate_samples(
        JointType::LeftShoulder,
        &[90.0, 91.0, 92.0],
        &CalibrationConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::CalibrationFailed);
}

#[test]
fn test_noisy_samples_lower_confidence() {
    let config = small_window();
    let steady: Vec<f64> = (0..30).map(|i| 120.0 + f64::from(i % 3)).collect();
    let noisy: Vec<f64> = (0..30).map(|i| 100.0 + f64::from(i % 7) * 6.0).collect();

    let calm = CalibrationEngine::calibrate_samples(JointType::RightShoulder, &steady, &config).unwrap();
    let shaky = CalibrationEngine::calibrate_samples(JointType::RightShoulder, &noisy, &config).unwrap();
    assert!(calm.confidence > shaky.confidence);
}

#[test]
fn test_timed_window_closes_itself() {
    common::init_test_logging();
    let config = CalibrationConfig::default();
    let duration = config.duration_ms;
    let mut engine = CalibrationEngine::new(config, KinematicsEngine::default());
    engine.start(JointType::LeftShoulder, 1_000);

    let mut outcome = None;
    let mut timestamp = 1_000;
    while outcome.is_none() {
        let angle = 118.0 + (timestamp / 100 % 5) as f64;
        let frame = pose_with_shoulder_angle(timestamp, angle);
        let result = engine.add_frame(Some(&frame), timestamp).unwrap();
        assert!(result.accepted);
        assert!(result.progress <= 1.0);
        outcome = result.outcome;
        timestamp += 100;
    }

    assert!(timestamp - 1_000 > duration);
    let Some(CalibrationOutcome::Completed(calibration)) = outcome else {
        panic!("calibration should complete");
    };
    assert_eq!(calibration.joint, JointType::LeftShoulder);
    assert!(calibration.max_angle > 118.0 && calibration.max_angle <= 122.0 + 1e-6);
    assert_eq!(engine.state(), CalibrationState::Completed);
    assert!(approx(engine.progress(), 1.0, f64::EPSILON));

    let mut profile = UserProfile::new("u-1", "Sam");
    profile.apply_calibration(calibration).unwrap();
    assert!(profile.is_calibrated(JointType::LeftShoulder));
}

#[test]
fn test_missing_detections_fail_the_window() {
    let mut engine = idle_engine();
    engine.start(JointType::LeftShoulder, 0);
    let mut outcome = None;
    for step in 0..=50_u64 {
        let timestamp = step * 100;
        let frame = pose_with_shoulder_angle(timestamp, 100.0);
        let detection = (step % 10 == 0).then_some(&frame);
        if let Some(result) = engine.add_frame(detection, timestamp).unwrap().outcome {
            outcome = Some(result);
        }
    }

    let Some(CalibrationOutcome::Failed { joint, reason }) = outcome else {
        panic!("sparse detections should fail calibration");
    };
    assert_eq!(joint, JointType::LeftShoulder);
    assert!(!reason.is_empty());
    assert_eq!(engine.state(), CalibrationState::Error);
}

#[test]
fn test_frames_rejected_before_start() {
    let mut engine = idle_engine();
    let frame = pose_with_shoulder_angle(0, 90.0);
    let err = engine.add_frame(Some(&frame), 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::CalibrationNotReady);
}

#[test]
fn test_reset_returns_to_idle() {
    let mut engine = idle_engine();
    engine.start(JointType::RightShoulder, 0);
    let frame = pose_with_shoulder_angle(0, 90.0);
    engine.add_frame(Some(&frame), 0).unwrap();
    assert_eq!(engine.samples().len(), 1);

    engine.reset();
    assert_eq!(engine.state(), CalibrationState::Idle);
    assert!(engine.samples().is_empty());
    assert!(engine.joint().is_none());
}
