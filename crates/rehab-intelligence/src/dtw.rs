// ABOUTME: Dynamic time warping rhythm analysis between user and reference joint-angle sequences
// ABOUTME: Single-joint and weighted multi-joint DTW, similarity bucketing and speed variation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # DTW Rhythm Analyzer
//!
//! Each sequence is smoothed with a centered moving average and min-max
//! normalized before alignment, so the comparison measures timing and shape
//! rather than amplitude. Distances are normalized by the longer sequence and
//! mapped to a 0-100 score with `100 * exp(-k * distance)`.
//!
//! Empty input on either side is not an error: it yields a perfect score with
//! quality [`RhythmQuality::Unknown`].

use crate::config::DtwConfig;
use crate::constants::dtw::{
    EMPTY_INPUT_SCORE, EXCELLENT_THRESHOLD, FAIR_THRESHOLD, FLAT_RANGE_EPSILON, GOOD_THRESHOLD,
    MIN_JOINT_WEIGHT, MIN_SPEED_DT_MS,
};
use crate::models::JointType;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Rhythm quality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhythmQuality {
    /// Score >= 85
    Excellent,
    /// Score >= 70
    Good,
    /// Score >= 50
    Fair,
    /// Score < 50
    Poor,
    /// No data to compare
    Unknown,
}

impl RhythmQuality {
    /// Bucket a 0-100 similarity score
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= EXCELLENT_THRESHOLD {
            Self::Excellent
        } else if score >= GOOD_THRESHOLD {
            Self::Good
        } else if score >= FAIR_THRESHOLD {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for RhythmQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result of one DTW comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtwResult {
    /// Accumulated alignment cost
    pub distance: f64,
    /// Distance divided by the longer sequence length
    pub normalized_distance: f64,
    /// Alignment path from `(0, 0)` to `(n - 1, m - 1)`
    pub path: Vec<(usize, usize)>,
    /// Similarity score (0-100)
    pub similarity_score: f64,
    /// Bucketed score
    pub rhythm_quality: RhythmQuality,
}

impl DtwResult {
    /// Sentinel returned when either side is empty
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            distance: 0.0,
            normalized_distance: 0.0,
            path: Vec::new(),
            similarity_score: EMPTY_INPUT_SCORE,
            rhythm_quality: RhythmQuality::Unknown,
        }
    }
}

/// Per-joint contribution to a weighted comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDtwDetail {
    /// Joint compared
    pub joint: JointType,
    /// Raw DTW distance
    pub distance: f64,
    /// Length-normalized distance
    pub normalized_distance: f64,
    /// Weight applied
    pub weight: f64,
}

/// Weighted multi-joint comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedDtwResult {
    /// Combined result; the path is that of the first analysed joint
    pub result: DtwResult,
    /// Joints that contributed, in joint order
    pub joints: Vec<JointDtwDetail>,
    /// Sum of contributing weights
    pub total_weight: f64,
}

/// Velocity statistics of one angle sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedAnalysis {
    /// Mean absolute angular speed (deg/s)
    pub mean_speed: f64,
    /// Standard deviation of signed angular velocity (deg/s)
    pub speed_std: f64,
    /// `1 / (1 + std / mean)`; 1 is perfectly even
    pub smoothness: f64,
    /// Largest absolute speed (deg/s)
    pub max_speed: f64,
    /// Smallest absolute speed (deg/s)
    pub min_speed: f64,
}

/// DTW analyzer
#[derive(Debug, Clone, Default)]
pub struct DtwAnalyzer {
    config: DtwConfig,
}

impl DtwAnalyzer {
    /// Create an analyzer
    #[must_use]
    pub const fn new(config: DtwConfig) -> Self {
        Self { config }
    }

    /// Analyzer configuration
    #[must_use]
    pub const fn config(&self) -> &DtwConfig {
        &self.config
    }

    /// Smooth then min-max normalize a sequence to [0, 1]
    #[must_use]
    pub fn preprocess(&self, sequence: &[f64]) -> Vec<f64> {
        let window = self.config.smoothing_window;
        let mut values = if window > 1 && sequence.len() >= window {
            moving_average(sequence, window)
        } else {
            sequence.to_vec()
        };

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if range > FLAT_RANGE_EPSILON {
            for v in &mut values {
                *v = (*v - min) / range;
            }
        }
        values
    }

    /// Compare one joint's user sequence against the reference
    #[must_use]
    pub fn analyze_joint(&self, user: &[f64], reference: &[f64]) -> DtwResult {
        let user = finite_samples(user);
        let reference = finite_samples(reference);
        if user.is_empty() || reference.is_empty() {
            return DtwResult::empty();
        }

        let (distance, path) = dtw(&self.preprocess(&user), &self.preprocess(&reference));
        let normalized_distance = distance / user.len().max(reference.len()) as f64;
        let similarity_score = self.similarity(normalized_distance);

        DtwResult {
            distance,
            normalized_distance,
            path,
            similarity_score,
            rhythm_quality: RhythmQuality::from_score(similarity_score),
        }
    }

    /// Weighted comparison across joints.
    ///
    /// Joints absent from either side, or weighted (near) zero, are skipped.
    /// Joints missing from `weights` use the configured default weight.
    #[must_use]
    pub fn analyze_weighted(
        &self,
        user: &HashMap<JointType, Vec<f64>>,
        reference: &HashMap<JointType, Vec<f64>>,
        weights: &BTreeMap<JointType, f64>,
    ) -> WeightedDtwResult {
        let mut joints: Vec<(JointType, f64, &[f64], &[f64])> = user
            .iter()
            .filter_map(|(&joint, user_seq)| {
                let reference_seq = reference.get(&joint)?;
                let weight = weights
                    .get(&joint)
                    .copied()
                    .unwrap_or(self.config.default_joint_weight);
                (weight >= MIN_JOINT_WEIGHT && !user_seq.is_empty() && !reference_seq.is_empty())
                    .then_some((joint, weight, user_seq.as_slice(), reference_seq.as_slice()))
            })
            .collect();
        joints.sort_by_key(|(joint, ..)| *joint);

        if joints.is_empty() {
            return WeightedDtwResult {
                result: DtwResult::empty(),
                joints: Vec::new(),
                total_weight: 0.0,
            };
        }

        let analysed: Vec<(JointDtwDetail, DtwResult)> = joints
            .par_iter()
            .map(|&(joint, weight, user_seq, reference_seq)| {
                let result = self.analyze_joint(user_seq, reference_seq);
                let detail = JointDtwDetail {
                    joint,
                    distance: result.distance,
                    normalized_distance: result.normalized_distance,
                    weight,
                };
                (detail, result)
            })
            .collect();

        let total_weight: f64 = analysed.iter().map(|(d, _)| d.weight).sum();
        let weighted_distance: f64 = analysed
            .iter()
            .map(|(d, _)| d.weight * d.normalized_distance)
            .sum();
        let raw_distance: f64 = analysed.iter().map(|(d, _)| d.weight * d.distance).sum();
        let final_distance = weighted_distance / total_weight;
        let similarity_score = self.similarity(final_distance);
        let path = analysed
            .first()
            .map(|(_, r)| r.path.clone())
            .unwrap_or_default();

        debug!(
            joints = analysed.len(),
            total_weight,
            final_distance,
            similarity_score,
            "Weighted DTW complete"
        );

        WeightedDtwResult {
            result: DtwResult {
                distance: raw_distance,
                normalized_distance: final_distance,
                path,
                similarity_score,
                rhythm_quality: RhythmQuality::from_score(similarity_score),
            },
            joints: analysed.into_iter().map(|(d, _)| d).collect(),
            total_weight,
        }
    }

    fn similarity(&self, normalized_distance: f64) -> f64 {
        (100.0 * (-self.config.similarity_decay * normalized_distance).exp()).clamp(0.0, 100.0)
    }

    /// Encouraging message for a rhythm result
    #[must_use]
    pub fn rhythm_feedback(result: &DtwResult) -> String {
        let score = result.similarity_score;
        match result.rhythm_quality {
            RhythmQuality::Excellent => format!("Excellent! Very smooth rhythm ({score:.0}%)"),
            RhythmQuality::Good => format!("Well done! Steady rhythm ({score:.0}%)"),
            RhythmQuality::Fair => format!("Not bad. Try to keep an even pace ({score:.0}%)"),
            RhythmQuality::Poor => {
                format!("Take your time, it gets easier with practice ({score:.0}%)")
            }
            RhythmQuality::Unknown => "Not enough movement to judge the rhythm yet".to_owned(),
        }
    }

    /// Velocity statistics of an angle sequence.
    ///
    /// Time steps below one millisecond are floored to one millisecond.
    #[must_use]
    pub fn analyze_speed_variation(timestamps_ms: &[u64], angles: &[f64]) -> SpeedAnalysis {
        let count = timestamps_ms.len().min(angles.len());
        if count < 2 {
            return SpeedAnalysis {
                mean_speed: 0.0,
                speed_std: 0.0,
                smoothness: 1.0,
                max_speed: 0.0,
                min_speed: 0.0,
            };
        }

        let velocities: Vec<f64> = timestamps_ms[..count]
            .windows(2)
            .zip(angles[..count].windows(2))
            .map(|(t, a)| {
                let dt_ms = (t[1] as f64 - t[0] as f64).max(MIN_SPEED_DT_MS);
                (a[1] - a[0]) / (dt_ms / 1000.0)
            })
            .collect();

        let n = velocities.len() as f64;
        let mean_speed = velocities.iter().map(|v| v.abs()).sum::<f64>() / n;
        let mean_velocity = velocities.iter().sum::<f64>() / n;
        let speed_std = (velocities
            .iter()
            .map(|v| (v - mean_velocity).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        let smoothness = if mean_speed > FLAT_RANGE_EPSILON {
            1.0 / (1.0 + speed_std / mean_speed)
        } else {
            1.0
        };
        let (min_speed, max_speed) = velocities
            .iter()
            .map(|v| v.abs())
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));

        SpeedAnalysis {
            mean_speed,
            speed_std,
            smoothness,
            max_speed,
            min_speed,
        }
    }
}

/// Drop NaN and infinite samples; they would poison every cost comparison
fn finite_samples(sequence: &[f64]) -> Vec<f64> {
    sequence.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Centered moving average with edge replication
fn moving_average(sequence: &[f64], window: usize) -> Vec<f64> {
    let len = sequence.len() as isize;
    let left = (window / 2) as isize;
    let right = window as isize - left - 1;
    (0..len)
        .map(|i| {
            let sum: f64 = (i - left..=i + right)
                .map(|k| sequence[k.clamp(0, len - 1) as usize])
                .sum();
            sum / window as f64
        })
        .collect()
}

/// Classic DTW with absolute-difference cost; returns the distance and the optimal path
fn dtw(a: &[f64], b: &[f64]) -> (f64, Vec<(usize, usize)>) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    let mut cost = vec![f64::INFINITY; (n + 1) * width];
    cost[0] = 0.0;

    for i in 1..=n {
        for j in 1..=m {
            let local = (a[i - 1] - b[j - 1]).abs();
            let best = cost[(i - 1) * width + j]
                .min(cost[i * width + j - 1])
                .min(cost[(i - 1) * width + j - 1]);
            cost[i * width + j] = local + best;
        }
    }

    let mut path = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    loop {
        path.push((i - 1, j - 1));
        if i == 1 && j == 1 {
            break;
        }
        // Along the first row or column only one predecessor stays inside the matrix
        if i == 1 {
            j -= 1;
            continue;
        }
        if j == 1 {
            i -= 1;
            continue;
        }
        let diagonal = cost[(i - 1) * width + j - 1];
        let up = cost[(i - 1) * width + j];
        let left = cost[i * width + j - 1];
        if diagonal <= up && diagonal <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();

    (cost[n * width + m], path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_replicates_edges() {
        let smoothed = moving_average(&[0.0, 0.0, 10.0, 0.0, 0.0], 3);
        assert!((smoothed[0] - 0.0).abs() < 1e-12);
        assert!((smoothed[1] - 10.0 / 3.0).abs() < 1e-12);
        assert!((smoothed[2] - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_dtw_handles_unequal_lengths() {
        let (distance, path) = dtw(&[0.0, 1.0, 2.0], &[0.0, 0.0, 1.0, 1.0, 2.0]);
        assert!(distance.abs() < 1e-12);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(2, 4)));
    }

    #[test]
    fn test_backtrack_stays_inside_matrix() {
        let (_, path) = dtw(&[f64::NAN, 1.0, 2.0], &[0.0, 1.0]);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(2, 1)));
    }

    #[test]
    fn test_quality_buckets() {
        assert_eq!(RhythmQuality::from_score(90.0), RhythmQuality::Excellent);
        assert_eq!(RhythmQuality::from_score(70.0), RhythmQuality::Good);
        assert_eq!(RhythmQuality::from_score(55.0), RhythmQuality::Fair);
        assert_eq!(RhythmQuality::from_score(10.0), RhythmQuality::Poor);
    }
}
