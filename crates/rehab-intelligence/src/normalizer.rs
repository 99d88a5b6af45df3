// ABOUTME: Procrustes skeleton normalization: centering, unit Frobenius scaling and optimal rotation
// ABOUTME: Makes two landmark sets comparable independent of camera distance, position and orientation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Skeleton Normalizer
//!
//! Orthogonal Procrustes alignment. Both skeletons are centered at the origin
//! and scaled to unit Frobenius norm; the rotation minimizing the squared
//! distance between them comes from the SVD of `targetᵀ · reference` as
//! `R = U · Vᵀ`. Reflections are not excluded.

use crate::config::NormalizerConfig;
use crate::constants::landmarks::{CORE_LANDMARKS, POSE_LANDMARK_COUNT};
use crate::constants::normalizer::NORM_EPSILON;
use crate::errors::{AppError, AppResult};
use crate::models::LandmarkFrame;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A 3x3 rotation, row-major, applied to row vectors as `p · R`
pub type Rotation = [[f64; 3]; 3];

const IDENTITY: Rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Landmarks after centroid removal and unit scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSkeleton {
    /// Transformed points
    pub points: Vec<[f64; 3]>,
    /// Centroid that was subtracted
    pub centroid: [f64; 3],
    /// Frobenius norm the centered points were divided by (1 when skipped)
    pub scale: f64,
    /// Rotation applied after scaling
    pub rotation: Rotation,
}

/// Outcome of aligning a target skeleton onto a reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Normalized and rotated target
    pub aligned: NormalizedSkeleton,
    /// Normalized reference
    pub reference: NormalizedSkeleton,
    /// Optimal rotation applied to the target
    pub rotation: Rotation,
    /// Sum of squared element-wise differences after alignment
    pub disparity: f64,
    /// `exp(-k * disparity)` clamped to [0, 1]
    pub similarity: f64,
}

/// Procrustes aligner
#[derive(Debug, Clone, Default)]
pub struct SkeletonNormalizer {
    config: NormalizerConfig,
}

impl SkeletonNormalizer {
    /// Create a normalizer
    #[must_use]
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Landmark coordinates to compare, restricted to the core subset when
    /// enabled and the frame carries the full scheme
    #[must_use]
    pub fn select_points(&self, frame: &LandmarkFrame) -> Vec<[f64; 3]> {
        if self.config.use_core_landmarks && frame.len() >= POSE_LANDMARK_COUNT {
            CORE_LANDMARKS
                .iter()
                .filter_map(|&i| frame.get(i).map(|l| l.coords()))
                .collect()
        } else {
            frame.landmarks().iter().map(|l| l.coords()).collect()
        }
    }

    /// Center at the origin and scale to unit Frobenius norm
    #[must_use]
    pub fn normalize(points: &[[f64; 3]]) -> NormalizedSkeleton {
        if points.is_empty() {
            return NormalizedSkeleton {
                points: Vec::new(),
                centroid: [0.0; 3],
                scale: 1.0,
                rotation: IDENTITY,
            };
        }

        let n = points.len() as f64;
        let mut centroid = [0.0; 3];
        for p in points {
            for (c, v) in centroid.iter_mut().zip(p) {
                *c += v;
            }
        }
        for c in &mut centroid {
            *c /= n;
        }

        let centered: Vec<[f64; 3]> = points
            .iter()
            .map(|p| [p[0] - centroid[0], p[1] - centroid[1], p[2] - centroid[2]])
            .collect();

        let norm = frobenius(&centered);
        let scale = if norm < NORM_EPSILON { 1.0 } else { norm };
        let scaled = centered
            .iter()
            .map(|p| [p[0] / scale, p[1] / scale, p[2] / scale])
            .collect();

        NormalizedSkeleton {
            points: scaled,
            centroid,
            scale,
            rotation: IDENTITY,
        }
    }

    /// Align `target` onto `reference`
    ///
    /// # Errors
    ///
    /// Returns `SHAPE_MISMATCH` when the point counts differ, or
    /// `INTERNAL_ERROR` if the SVD fails to produce singular vectors
    pub fn align(&self, target: &[[f64; 3]], reference: &[[f64; 3]]) -> AppResult<AlignmentResult> {
        if target.len() != reference.len() {
            return Err(AppError::shape_mismatch(reference.len(), target.len()));
        }

        let target_norm = Self::normalize(target);
        let reference_norm = Self::normalize(reference);
        if target.is_empty() {
            return Ok(AlignmentResult {
                aligned: target_norm,
                reference: reference_norm,
                rotation: IDENTITY,
                disparity: 0.0,
                similarity: 1.0,
            });
        }

        let rotation = optimal_rotation(&target_norm.points, &reference_norm.points)?;
        let rotated = rotate(&target_norm.points, &rotation);

        let disparity: f64 = rotated
            .iter()
            .zip(&reference_norm.points)
            .map(|(a, b)| (0..3).map(|k| (a[k] - b[k]).powi(2)).sum::<f64>())
            .sum();
        let similarity = (-self.config.similarity_decay * disparity)
            .exp()
            .clamp(0.0, 1.0);

        debug!(
            points = target.len(),
            disparity, similarity, "Aligned skeleton"
        );

        Ok(AlignmentResult {
            aligned: NormalizedSkeleton {
                points: rotated,
                rotation,
                ..target_norm
            },
            reference: reference_norm,
            rotation,
            disparity,
            similarity,
        })
    }

    /// Align two landmark frames after landmark selection
    ///
    /// # Errors
    ///
    /// Same as [`Self::align`]
    pub fn align_frames(
        &self,
        target: &LandmarkFrame,
        reference: &LandmarkFrame,
    ) -> AppResult<AlignmentResult> {
        self.align(&self.select_points(target), &self.select_points(reference))
    }

    /// Re-apply a stored transformation to another set of points
    #[must_use]
    pub fn apply_transformation(
        points: &[[f64; 3]],
        centroid: [f64; 3],
        scale: f64,
        rotation: &Rotation,
    ) -> Vec<[f64; 3]> {
        let scale = if scale.abs() < NORM_EPSILON { 1.0 } else { scale };
        let normalized: Vec<[f64; 3]> = points
            .iter()
            .map(|p| {
                [
                    (p[0] - centroid[0]) / scale,
                    (p[1] - centroid[1]) / scale,
                    (p[2] - centroid[2]) / scale,
                ]
            })
            .collect();
        rotate(&normalized, rotation)
    }
}

fn frobenius(points: &[[f64; 3]]) -> f64 {
    points
        .iter()
        .flat_map(|p| p.iter())
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

fn rotate(points: &[[f64; 3]], rotation: &Rotation) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| {
            let mut out = [0.0; 3];
            for (k, slot) in out.iter_mut().enumerate() {
                *slot = (0..3).map(|j| p[j] * rotation[j][k]).sum();
            }
            out
        })
        .collect()
}

fn optimal_rotation(target: &[[f64; 3]], reference: &[[f64; 3]]) -> AppResult<Rotation> {
    let cross = Matrix3::from_fn(|j, k| {
        target
            .iter()
            .zip(reference)
            .map(|(t, r)| t[j] * r[k])
            .sum::<f64>()
    });

    let svd = cross.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(AppError::internal("SVD did not produce singular vectors"));
    };
    let r = u * v_t;

    let mut rotation = IDENTITY;
    for (j, row) in rotation.iter_mut().enumerate() {
        for (k, cell) in row.iter_mut().enumerate() {
            *cell = r[(j, k)];
        }
    }
    Ok(rotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_identity() {
        let points = vec![[1.0, 2.0, 3.0]];
        assert_eq!(rotate(&points, &IDENTITY), points);
    }

    #[test]
    fn test_degenerate_points_keep_scale_one() {
        let skeleton = SkeletonNormalizer::normalize(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
        assert!((skeleton.scale - 1.0).abs() < f64::EPSILON);
        assert!(skeleton.points.iter().all(|p| p.iter().all(|v| v.abs() < 1e-12)));
    }
}
