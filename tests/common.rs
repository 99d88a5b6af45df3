// ABOUTME: Shared test utilities and fixtures for integration tests
// ABOUTME: Builds synthetic landmark frames, exercises and quiet test logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `rehab_sync_engine`

use rehab_sync_engine::config::EngineConfig;
use rehab_sync_engine::constants::landmarks::POSE_LANDMARK_COUNT;
use rehab_sync_engine::engine::FrameInput;
use rehab_sync_engine::models::{ExerciseDefinition, Landmark, LandmarkFrame, PoseDetection};
use std::env;
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Full 33-point pose with both shoulders abducted to `angle` degrees.
///
/// Shoulders sit at y = 0, hips straight below them, elbows rotated away
/// from the hip direction by `angle`.
pub fn pose_with_shoulder_angle(timestamp_ms: u64, angle: f64) -> LandmarkFrame {
    let (sin, cos) = angle.to_radians().sin_cos();
    let mut landmarks: Vec<Landmark> = (0..POSE_LANDMARK_COUNT)
        .map(|i| Landmark::new(0.5, 2.0 + i as f64 * 0.05, 0.0))
        .collect();

    landmarks[11] = Landmark::new(0.0, 0.0, 0.0);
    landmarks[12] = Landmark::new(1.0, 0.0, 0.0);
    landmarks[13] = Landmark::new(-0.3 * sin, 0.3 * cos, 0.0);
    landmarks[14] = Landmark::new(0.3f64.mul_add(sin, 1.0), 0.3 * cos, 0.0);
    landmarks[15] = Landmark::new(-0.6 * sin, 0.6 * cos, 0.0);
    landmarks[16] = Landmark::new(0.6f64.mul_add(sin, 1.0), 0.6 * cos, 0.0);
    landmarks[23] = Landmark::new(0.0, 1.0, 0.0);
    landmarks[24] = Landmark::new(1.0, 1.0, 0.0);
    landmarks[25] = Landmark::new(0.0, 1.5, 0.0);
    landmarks[26] = Landmark::new(1.0, 1.5, 0.0);
    landmarks[27] = Landmark::new(0.0, 2.0, 0.0);
    landmarks[28] = Landmark::new(1.0, 2.0, 0.0);

    LandmarkFrame::new(timestamp_ms, landmarks)
}

/// Frame input with a detected pose at the given shoulder angle
pub fn detected(timestamp_ms: u64, angle: f64) -> FrameInput {
    FrameInput::new(
        timestamp_ms,
        PoseDetection::Detected(pose_with_shoulder_angle(timestamp_ms, angle)),
    )
}

/// Frame input without a detection
pub fn missing(timestamp_ms: u64) -> FrameInput {
    FrameInput::new(timestamp_ms, PoseDetection::NoDetection)
}

/// Single-rep arm raise: 100 frames at 30 fps peaking at 150 degrees
pub fn single_arm_raise() -> ExerciseDefinition {
    ExerciseDefinition::arm_raise(100, 30.0, 150.0, 1).unwrap()
}

/// Ramp 0 -> 150 over 40 frames, hold 40 frames, lower over 50, rest 60
pub fn arm_raise_user_angle(frame: usize) -> f64 {
    match frame {
        0..=39 => 150.0 * frame as f64 / 39.0,
        40..=79 => 150.0,
        80..=129 => 150.0 * (1.0 - (frame as f64 - 79.0) / 50.0),
        _ => 0.0,
    }
}

/// Short countdowns and windows so a whole session fits in a few hundred frames
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.detection.stable_frames_required = 3;
    config.detection.countdown_ms = 100;
    config.calibration.countdown_ms = 100;
    config.calibration.duration_ms = 1_000;
    config.calibration.min_samples = 5;
    config.calibration.min_clean_samples = 3;
    config.validate().unwrap();
    config
}

/// Float comparison helper
pub fn approx(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}
