// ABOUTME: Integration tests for Procrustes skeleton alignment
// ABOUTME: Verifies invariance to translation, scale and rotation plus shape validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{approx, pose_with_shoulder_angle};
use rehab_sync_engine::config::NormalizerConfig;
use rehab_sync_engine::errors::ErrorCode;
use rehab_sync_engine::intelligence::SkeletonNormalizer;

fn skeleton() -> Vec<[f64; 3]> {
    vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.2, 0.1],
        [0.4, 1.3, -0.2],
        [-0.7, 0.9, 0.5],
        [0.3, -0.8, 0.9],
        [1.1, 1.0, -0.6],
    ]
}

/// Rotate about z by `degrees`, scale, then translate
fn transform(points: &[[f64; 3]], degrees: f64, scale: f64, offset: [f64; 3]) -> Vec<[f64; 3]> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    points
        .iter()
        .map(|p| {
            [
                scale * (cos * p[0] - sin * p[1]) + offset[0],
                scale * (sin * p[0] + cos * p[1]) + offset[1],
                scale * p[2] + offset[2],
            ]
        })
        .collect()
}

#[test]
fn test_self_alignment_is_perfect() {
    let normalizer = SkeletonNormalizer::default();
    let points = skeleton();
    let result = normalizer.align(&points, &points).unwrap();
    assert!(result.disparity < 1e-9);
    assert!(approx(result.similarity, 1.0, 1e-9));
}

#[test]
fn test_similarity_transform_is_removed() {
    let normalizer = SkeletonNormalizer::default();
    let reference = skeleton();
    let moved = transform(&reference, 35.0, 2.5, [4.0, -3.0, 1.5]);

    let result = normalizer.align(&moved, &reference).unwrap();
    assert!(result.disparity < 1e-9, "disparity {}", result.disparity);
    assert!(result.similarity > 0.999_999);
    assert!(approx(result.aligned.scale, 2.5 * result.reference.scale, 1e-9));
}

#[test]
fn test_different_shapes_lose_similarity() {
    let normalizer = SkeletonNormalizer::default();
    let mut other = skeleton();
    other[2] = [2.0, -1.0, 0.0];
    other[5] = [-1.5, -1.5, 0.3];
    let result = normalizer.align(&other, &skeleton()).unwrap();
    assert!(result.disparity > 1e-3);
    assert!(result.similarity < 1.0);
    assert!(result.similarity >= 0.0);
}

#[test]
fn test_shape_mismatch() {
    let normalizer = SkeletonNormalizer::default();
    let points = skeleton();
    let err = normalizer.align(&points[..4], &points).unwrap_err();
    assert_eq!(err.code, ErrorCode::ShapeMismatch);
}

#[test]
fn test_normalize_is_centered_and_unit_scaled() {
    let normalized = SkeletonNormalizer::normalize(&transform(&skeleton(), 0.0, 3.0, [5.0, 5.0, 5.0]));
    let mut centroid = [0.0; 3];
    let mut norm_sq = 0.0;
    for p in &normalized.points {
        for k in 0..3 {
            centroid[k] += p[k];
            norm_sq += p[k] * p[k];
        }
    }
    assert!(centroid.iter().all(|c| c.abs() < 1e-9));
    assert!(approx(norm_sq, 1.0, 1e-9));
}

#[test]
fn test_coincident_points_keep_unit_scale() {
    let normalized = SkeletonNormalizer::normalize(&[[2.0, 2.0, 2.0]; 4]);
    assert!(approx(normalized.scale, 1.0, f64::EPSILON));
    assert!(normalized.points.iter().flatten().all(|v| v.abs() < 1e-12));
}

#[test]
fn test_apply_transformation_reproduces_alignment() {
    let normalizer = SkeletonNormalizer::default();
    let reference = skeleton();
    let moved = transform(&reference, -50.0, 0.5, [1.0, 2.0, 3.0]);
    let result = normalizer.align(&moved, &reference).unwrap();

    let replayed = SkeletonNormalizer::apply_transformation(
        &moved,
        result.aligned.centroid,
        result.aligned.scale,
        &result.rotation,
    );
    for (a, b) in replayed.iter().zip(&result.aligned.points) {
        for k in 0..3 {
            assert!(approx(a[k], b[k], 1e-9));
        }
    }
}

#[test]
fn test_core_landmark_selection() {
    let frame = pose_with_shoulder_angle(0, 45.0);
    let core = SkeletonNormalizer::new(NormalizerConfig {
        use_core_landmarks: true,
        ..NormalizerConfig::default()
    });
    let full = SkeletonNormalizer::new(NormalizerConfig {
        use_core_landmarks: false,
        ..NormalizerConfig::default()
    });
    assert!(core.select_points(&frame).len() < full.select_points(&frame).len());
    assert_eq!(full.select_points(&frame).len(), frame.len());

    let aligned = core.align_frames(&frame, &frame).unwrap();
    assert!(aligned.disparity < 1e-9);
}
