// ABOUTME: Integration tests for personalized target rescaling
// ABOUTME: Covers scale factors, the 1.0 cap, trajectories, interpolation and tolerance buckets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::approx;
use rehab_sync_engine::errors::ErrorCode;
use rehab_sync_engine::intelligence::{
    Direction, TargetClassification, TargetRescaler, TargetTrajectory,
};
use rehab_sync_engine::models::{
    CalibrationState, JointCalibration, JointType, UserProfile,
};
use std::collections::BTreeMap;

#[test]
fn test_scale_factor_with_challenge() {
    let scale = TargetRescaler::compute_scale_factor(90.0, 120.0, 0.05).unwrap();
    assert!(approx(scale, 0.7875, 1e-12));

    let motion = TargetRescaler::rescale(&[0.0, 60.0, 120.0, 60.0, 0.0], 90.0, 0.05).unwrap();
    assert!(approx(motion.max_target(), 94.5, 1e-9));
    assert!(approx(motion.reduction_percent(), 21.25, 1e-9));
    assert_eq!(motion.rescaled.len(), motion.original.len());
}

#[test]
fn test_scale_factor_is_capped() {
    let scale = TargetRescaler::compute_scale_factor(150.0, 120.0, 0.05).unwrap();
    assert!(approx(scale, 1.0, f64::EPSILON));
}

#[test]
fn test_zero_user_max_gives_flat_target() {
    let motion = TargetRescaler::rescale(&[0.0, 90.0, 0.0], 0.0, 0.05).unwrap();
    assert!(motion.rescaled.iter().all(|a| *a == 0.0));
    assert!(approx(motion.scale_factor, 0.0, f64::EPSILON));
}

#[test]
fn test_zero_reference_amplitude() {
    let err = TargetRescaler::compute_scale_factor(90.0, 0.0, 0.05).unwrap_err();
    assert_eq!(err.code, ErrorCode::ZeroReferenceAmplitude);
    let err = TargetRescaler::rescale(&[0.0, 0.0, 0.0], 90.0, 0.05).unwrap_err();
    assert_eq!(err.code, ErrorCode::ZeroReferenceAmplitude);
}

#[test]
fn test_empty_reference() {
    let motion = TargetRescaler::rescale(&[], 90.0, 0.05).unwrap();
    assert!(motion.rescaled.is_empty());
    assert!(approx(motion.scale_factor, 1.0, f64::EPSILON));
}

#[test]
fn test_rescaling_preserves_shape() {
    let reference: Vec<f64> = (0..20).map(|i| f64::from(i) * 7.5).collect();
    let motion = TargetRescaler::rescale(&reference, 100.0, 0.0).unwrap();
    for pair in motion.rescaled.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
    assert!(motion.rescaled.iter().all(|a| *a <= 100.0 + 1e-9));
}

#[test]
fn test_multi_joint_uses_profile() {
    let mut profile = UserProfile::new("patient-7", "Pat");
    profile
        .apply_calibration(JointCalibration {
            joint: JointType::LeftShoulder,
            max_angle: 60.0,
            min_angle: 0.0,
            confidence: 0.9,
            num_samples: 40,
            outliers_removed: 0,
            state: CalibrationState::Completed,
            calibrated_at: chrono::Utc::now(),
        })
        .unwrap();

    let reference = BTreeMap::from([
        (JointType::LeftShoulder, vec![0.0, 120.0, 0.0]),
        (JointType::LeftElbow, vec![10.0, 40.0, 10.0]),
    ]);
    let motions = TargetRescaler::rescale_multi_joint(&reference, &profile, 0.0).unwrap();
    assert!(approx(motions[&JointType::LeftShoulder].scale_factor, 0.5, 1e-12));
    assert!(approx(motions[&JointType::LeftElbow].scale_factor, 1.0, 1e-12));
    assert_eq!(motions[&JointType::LeftElbow].rescaled, vec![10.0, 40.0, 10.0]);
}

#[test]
fn test_trajectory_timeline() {
    let reference = [0.0, 50.0, 100.0, 50.0];
    let trajectory =
        TargetRescaler::generate_target_trajectory(&reference, 100.0, 4000.0, 30.0, 0.0).unwrap();
    assert_eq!(trajectory.timestamps_ms(), &[0.0, 1000.0, 2000.0, 3000.0]);
    assert_eq!(trajectory.angles().len(), reference.len());
    assert!(approx(trajectory.peak(), 100.0, 1e-12));

    let from_fps =
        TargetRescaler::generate_target_trajectory(&reference, 100.0, 0.0, 2.0, 0.0).unwrap();
    assert_eq!(from_fps.timestamps_ms(), &[0.0, 500.0, 1000.0, 1500.0]);

    let err = TargetRescaler::generate_target_trajectory(&reference, 100.0, 0.0, 0.0, 0.0)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[test]
fn test_target_at_interpolates_and_clamps() {
    let trajectory =
        TargetTrajectory::new(vec![0.0, 1000.0, 2000.0], vec![10.0, 30.0, 20.0], 1.0).unwrap();
    assert!(approx(trajectory.target_at(-50.0), 10.0, 1e-12));
    assert!(approx(trajectory.target_at(500.0), 20.0, 1e-12));
    assert!(approx(trajectory.target_at(1500.0), 25.0, 1e-12));
    assert!(approx(trajectory.target_at(9000.0), 20.0, 1e-12));

    assert!(TargetTrajectory::new(vec![0.0], vec![], 1.0).is_err());
}

#[test]
fn test_compare_buckets() {
    let perfect = TargetRescaler::compare(92.0, 90.0, 15.0);
    assert_eq!(perfect.classification, TargetClassification::Perfect);
    assert_eq!(perfect.feedback, Direction::Hold);

    let good = TargetRescaler::compare(80.0, 90.0, 15.0);
    assert_eq!(good.classification, TargetClassification::Good);
    assert!(good.classification.is_on_target());

    let under = TargetRescaler::compare(60.0, 90.0, 15.0);
    assert_eq!(under.classification, TargetClassification::Under);
    assert_eq!(under.feedback, Direction::Raise);
    assert!(approx(under.error, -30.0, 1e-12));

    let over = TargetRescaler::compare(120.0, 90.0, 15.0);
    assert_eq!(over.classification, TargetClassification::Over);
    assert_eq!(over.feedback, Direction::Lower);
}
