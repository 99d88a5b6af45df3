// ABOUTME: Maps reference angle trajectories onto a user's calibrated range with a capped challenge
// ABOUTME: Time-interpolated target lookup and tolerance classification of live angles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Target Rescaling Engine
//!
//! `scale = (user_max / ref_max) * (1 + challenge)`, capped at 1.0 so the
//! target never exceeds the reference demonstration. A reference without
//! motion is a configuration error; a user without range gets scale 0.

use crate::constants::rescaling::{AMPLITUDE_EPSILON, PERFECT_RATIO};
use crate::errors::{AppError, AppResult};
use crate::models::{JointType, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A reference trajectory rescaled for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescaledMotion {
    /// Reference angles
    pub original: Vec<f64>,
    /// Personalized target angles
    pub rescaled: Vec<f64>,
    /// Factor applied to every reference angle
    pub scale_factor: f64,
    /// User's calibrated maximum
    pub user_max: f64,
    /// Reference maximum
    pub ref_max: f64,
}

impl RescaledMotion {
    /// Peak of the personalized target
    #[must_use]
    pub fn max_target(&self) -> f64 {
        self.rescaled.iter().copied().fold(0.0, f64::max)
    }

    /// How much the target was reduced relative to the reference (%)
    #[must_use]
    pub fn reduction_percent(&self) -> f64 {
        (1.0 - self.scale_factor) * 100.0
    }
}

/// Personalized target angles on a millisecond timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTrajectory {
    timestamps_ms: Vec<f64>,
    angles: Vec<f64>,
    scale_factor: f64,
}

impl TargetTrajectory {
    /// Build a trajectory from matching timestamp and angle sequences
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` when the lengths differ
    pub fn new(timestamps_ms: Vec<f64>, angles: Vec<f64>, scale_factor: f64) -> AppResult<Self> {
        if timestamps_ms.len() != angles.len() {
            return Err(AppError::invalid_input(format!(
                "Trajectory has {} timestamps but {} angles",
                timestamps_ms.len(),
                angles.len()
            )));
        }
        Ok(Self {
            timestamps_ms,
            angles,
            scale_factor,
        })
    }

    /// Keyframe timestamps (ms)
    #[must_use]
    pub fn timestamps_ms(&self) -> &[f64] {
        &self.timestamps_ms
    }

    /// Target angle per keyframe
    #[must_use]
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Scale factor the trajectory was built with
    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Largest target angle
    #[must_use]
    pub fn peak(&self) -> f64 {
        self.angles.iter().copied().fold(0.0, f64::max)
    }

    /// Target at an arbitrary time, linearly interpolated between keyframes
    /// and clamped to the first/last keyframe outside the timeline
    #[must_use]
    pub fn target_at(&self, timestamp_ms: f64) -> f64 {
        let (Some(&first_ts), Some(&last_ts)) =
            (self.timestamps_ms.first(), self.timestamps_ms.last())
        else {
            return 0.0;
        };
        if timestamp_ms <= first_ts {
            return self.angles[0];
        }
        if timestamp_ms >= last_ts {
            return self.angles[self.angles.len() - 1];
        }

        let upper = self.timestamps_ms.partition_point(|&t| t <= timestamp_ms);
        let lower = upper - 1;
        let (t0, t1) = (self.timestamps_ms[lower], self.timestamps_ms[upper]);
        let (a0, a1) = (self.angles[lower], self.angles[upper]);
        if (t1 - t0).abs() < f64::EPSILON {
            return a0;
        }
        (a1 - a0).mul_add((timestamp_ms - t0) / (t1 - t0), a0)
    }
}

/// Tolerance classification of a live angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetClassification {
    /// Within the perfect share of the tolerance
    Perfect,
    /// Within the full tolerance
    Good,
    /// Below the target
    Under,
    /// Above the target
    Over,
}

impl TargetClassification {
    /// Whether the angle is within tolerance
    #[must_use]
    pub const fn is_on_target(self) -> bool {
        matches!(self, Self::Perfect | Self::Good)
    }
}

/// Direction the user should move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increase the joint angle
    Raise,
    /// Decrease the joint angle
    Lower,
    /// Stay where you are
    Hold,
}

/// Live angle compared to its target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetComparison {
    /// Tolerance bucket
    pub classification: TargetClassification,
    /// Signed error `user - target` (degrees)
    pub error: f64,
    /// Directional feedback
    pub feedback: Direction,
}

impl TargetComparison {
    /// Short instruction for the user
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self.feedback {
            Direction::Raise => "Raise a little higher",
            Direction::Lower => "Lower a little",
            Direction::Hold => "Good, keep going",
        }
    }
}

/// Rescaling operations
pub struct TargetRescaler;

impl TargetRescaler {
    /// Personal scale factor, capped at 1.0
    ///
    /// # Errors
    ///
    /// Returns `ZERO_REFERENCE_AMPLITUDE` when `ref_max` is (near) zero
    pub fn compute_scale_factor(user_max: f64, ref_max: f64, challenge_factor: f64) -> AppResult<f64> {
        if ref_max.abs() < AMPLITUDE_EPSILON {
            return Err(AppError::zero_reference_amplitude(ref_max));
        }
        if user_max < AMPLITUDE_EPSILON {
            return Ok(0.0);
        }
        Ok((user_max / ref_max * (1.0 + challenge_factor)).min(1.0))
    }

    /// Scale every reference angle. An empty reference yields scale 1.
    ///
    /// # Errors
    ///
    /// Returns `ZERO_REFERENCE_AMPLITUDE` for a non-empty reference without motion
    pub fn rescale(ref_angles: &[f64], user_max: f64, challenge_factor: f64) -> AppResult<RescaledMotion> {
        if ref_angles.is_empty() {
            return Ok(RescaledMotion {
                original: Vec::new(),
                rescaled: Vec::new(),
                scale_factor: 1.0,
                user_max,
                ref_max: 0.0,
            });
        }

        let ref_max = ref_angles.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let scale_factor = Self::compute_scale_factor(user_max, ref_max, challenge_factor)?;
        debug!(user_max, ref_max, scale_factor, "Rescaled reference motion");

        Ok(RescaledMotion {
            original: ref_angles.to_vec(),
            rescaled: ref_angles.iter().map(|a| a * scale_factor).collect(),
            scale_factor,
            user_max,
            ref_max,
        })
    }

    /// Rescale several joints from one profile; uncalibrated joints keep scale 1
    ///
    /// # Errors
    ///
    /// Returns `ZERO_REFERENCE_AMPLITUDE` for a calibrated joint whose reference has no motion
    pub fn rescale_multi_joint(
        reference: &BTreeMap<JointType, Vec<f64>>,
        profile: &UserProfile,
        challenge_factor: f64,
    ) -> AppResult<BTreeMap<JointType, RescaledMotion>> {
        reference
            .iter()
            .map(|(&joint, angles)| {
                let motion = match profile.max_angle(joint) {
                    Some(user_max) => Self::rescale(angles, user_max, challenge_factor)?,
                    None => {
                        let ref_max = angles.iter().copied().fold(0.0, f64::max);
                        RescaledMotion {
                            original: angles.clone(),
                            rescaled: angles.clone(),
                            scale_factor: 1.0,
                            user_max: ref_max,
                            ref_max,
                        }
                    }
                };
                Ok((joint, motion))
            })
            .collect()
    }

    /// Personalized trajectory with frame `i` at `i * duration / n`.
    ///
    /// A zero `duration_ms` derives the duration from `fps`.
    ///
    /// # Errors
    ///
    /// Returns `ZERO_REFERENCE_AMPLITUDE` for a reference without motion, and
    /// `INVALID_INPUT` when the duration must come from a non-positive fps
    pub fn generate_target_trajectory(
        ref_angles: &[f64],
        user_max: f64,
        duration_ms: f64,
        fps: f64,
        challenge_factor: f64,
    ) -> AppResult<TargetTrajectory> {
        let motion = Self::rescale(ref_angles, user_max, challenge_factor)?;
        let n = ref_angles.len() as f64;
        let duration_ms = if duration_ms > 0.0 {
            duration_ms
        } else if fps > 0.0 {
            n * 1000.0 / fps
        } else {
            return Err(AppError::invalid_input(
                "Trajectory needs a positive duration or fps",
            ));
        };

        let timestamps = (0..ref_angles.len())
            .map(|i| i as f64 * duration_ms / n)
            .collect();
        TargetTrajectory::new(timestamps, motion.rescaled, motion.scale_factor)
    }

    /// Classify a live angle with the default perfect ratio
    #[must_use]
    pub fn compare(user_angle: f64, target_angle: f64, tolerance: f64) -> TargetComparison {
        Self::compare_with_ratio(user_angle, target_angle, tolerance, PERFECT_RATIO)
    }

    /// Classify a live angle: perfect within `tolerance * perfect_ratio`, good within `tolerance`
    #[must_use]
    pub fn compare_with_ratio(
        user_angle: f64,
        target_angle: f64,
        tolerance: f64,
        perfect_ratio: f64,
    ) -> TargetComparison {
        let error = user_angle - target_angle;
        let classification = if error.abs() <= tolerance * perfect_ratio {
            TargetClassification::Perfect
        } else if error.abs() <= tolerance {
            TargetClassification::Good
        } else if error < 0.0 {
            TargetClassification::Under
        } else {
            TargetClassification::Over
        };
        let feedback = match classification {
            TargetClassification::Under => Direction::Raise,
            TargetClassification::Over => Direction::Lower,
            TargetClassification::Perfect | TargetClassification::Good => Direction::Hold,
        };
        TargetComparison {
            classification,
            error,
            feedback,
        }
    }
}
