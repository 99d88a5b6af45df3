// ABOUTME: Safe-max calibration: timed per-joint sample window, median filter and MAD outlier rejection
// ABOUTME: Produces a joint calibration with confidence; failed windows never touch the user profile
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Calibration Engine
//!
//! State machine `IDLE → COLLECTING → PROCESSING → COMPLETED`, with `ERROR`
//! reachable when the window yields too few usable samples. The window is
//! bounded by wall-clock time, not frame count.
//!
//! Denoising pipeline on window close:
//! 1. sliding median filter (edge windows truncated)
//! 2. rejection of points beyond `threshold * 1.4826 * MAD` from the median
//! 3. calibrated max/min taken at the configured percentiles
//!
//! Confidence is `sample_factor * inlier_fraction * spread_factor`.

use crate::config::CalibrationConfig;
use crate::constants::calibration::{CONFIDENCE_STD_SPAN, MAD_SCALE};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::kinematics::KinematicsEngine;
use crate::models::{CalibrationState, JointCalibration, JointType, LandmarkFrame};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How a calibration window ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    /// A safe maximum was produced
    Completed(JointCalibration),
    /// The window produced no usable result
    Failed {
        /// Joint being calibrated
        joint: JointType,
        /// Why the window failed
        reason: String,
    },
}

impl CalibrationOutcome {
    /// Convert into a result, mapping failure to `CALIBRATION_FAILED`
    ///
    /// # Errors
    ///
    /// Returns `CALIBRATION_FAILED` for [`CalibrationOutcome::Failed`]
    pub fn into_result(self) -> AppResult<JointCalibration> {
        match self {
            Self::Completed(calibration) => Ok(calibration),
            Self::Failed { reason, .. } => Err(AppError::calibration_failed(reason)),
        }
    }
}

/// What happened to one frame fed into the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    /// Whether the frame contributed a sample
    pub accepted: bool,
    /// Angle measured from the frame
    pub angle: Option<f64>,
    /// Window progress (0-1)
    pub progress: f64,
    /// Engine state after the frame
    pub state: CalibrationState,
    /// Set on the frame that closed the window
    pub outcome: Option<CalibrationOutcome>,
}

/// Timed per-joint calibration
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
    kinematics: KinematicsEngine,
    state: CalibrationState,
    joint: Option<JointType>,
    started_at_ms: u64,
    elapsed_ms: u64,
    samples: Vec<f64>,
    outcome: Option<CalibrationOutcome>,
}

impl CalibrationEngine {
    /// Create an idle engine
    #[must_use]
    pub const fn new(config: CalibrationConfig, kinematics: KinematicsEngine) -> Self {
        Self {
            config,
            kinematics,
            state: CalibrationState::Idle,
            joint: None,
            started_at_ms: 0,
            elapsed_ms: 0,
            samples: Vec::new(),
            outcome: None,
        }
    }

    /// Open a collection window for `joint`, discarding any previous run
    pub fn start(&mut self, joint: JointType, timestamp_ms: u64) {
        info!(joint = %joint, duration_ms = self.config.duration_ms, "Calibration window opened");
        self.state = CalibrationState::Collecting;
        self.joint = Some(joint);
        self.started_at_ms = timestamp_ms;
        self.elapsed_ms = 0;
        self.samples.clear();
        self.outcome = None;
    }

    /// Feed one frame; `None` means the detector found nobody.
    ///
    /// The window closes itself once `duration_ms` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns `CALIBRATION_NOT_READY` when no window is open, and
    /// `UNKNOWN_JOINT` when the joint is missing from the joint table
    pub fn add_frame(
        &mut self,
        frame: Option<&LandmarkFrame>,
        timestamp_ms: u64,
    ) -> AppResult<FrameOutcome> {
        let (CalibrationState::Collecting, Some(joint)) = (self.state, self.joint) else {
            return Err(AppError::calibration_not_ready(format!(
                "Calibration is {:?}, not collecting",
                self.state
            )));
        };

        self.elapsed_ms = timestamp_ms.saturating_sub(self.started_at_ms);

        let angle = match frame.map(|f| self.kinematics.joint_angle(f, joint)) {
            Some(Ok(angle)) => angle,
            Some(Err(e)) if e.code == ErrorCode::DegenerateGeometry => None,
            Some(Err(e)) => return Err(e),
            None => None,
        };
        if let Some(angle) = angle {
            self.samples.push(angle);
        }

        let outcome = (self.elapsed_ms >= self.config.duration_ms).then(|| self.finish());

        Ok(FrameOutcome {
            accepted: angle.is_some(),
            angle,
            progress: self.progress(),
            state: self.state,
            outcome,
        })
    }

    /// Close the window and run the denoising pipeline
    pub fn finish(&mut self) -> CalibrationOutcome {
        let Some(joint) = self.joint else {
            return CalibrationOutcome::Failed {
                joint: JointType::LeftShoulder,
                reason: "No calibration window was started".to_owned(),
            };
        };

        self.state = CalibrationState::Processing;
        let outcome = match Self::calibrate_samples(joint, &self.samples, &self.config) {
            Ok(calibration) => {
                info!(
                    joint = %joint,
                    max_angle = calibration.max_angle,
                    confidence = calibration.confidence,
                    samples = calibration.num_samples,
                    "Calibration completed"
                );
                self.state = CalibrationState::Completed;
                CalibrationOutcome::Completed(calibration)
            }
            Err(e) => {
                warn!(joint = %joint, error = %e, "Calibration failed");
                self.state = CalibrationState::Error;
                CalibrationOutcome::Failed {
                    joint,
                    reason: e.message,
                }
            }
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Window progress (0-1)
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self.state {
            CalibrationState::Idle => 0.0,
            CalibrationState::Collecting => {
                (self.elapsed_ms as f64 / self.config.duration_ms as f64).min(1.0)
            }
            CalibrationState::Processing
            | CalibrationState::Completed
            | CalibrationState::Error => 1.0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> CalibrationState {
        self.state
    }

    /// Joint of the current or last window
    #[must_use]
    pub const fn joint(&self) -> Option<JointType> {
        self.joint
    }

    /// Samples collected in the current window
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Outcome of the last closed window
    #[must_use]
    pub const fn result(&self) -> Option<&CalibrationOutcome> {
        self.outcome.as_ref()
    }

    /// Return to IDLE
    pub fn reset(&mut self) {
        self.state = CalibrationState::Idle;
        self.joint = None;
        self.elapsed_ms = 0;
        self.samples.clear();
        self.outcome = None;
    }

    /// Run the denoising pipeline over an offline sample buffer
    ///
    /// # Errors
    ///
    /// Returns `CALIBRATION_FAILED` when there are fewer than `min_samples`
    /// raw samples or fewer than `min_clean_samples` after outlier rejection
    pub fn calibrate_samples(
        joint: JointType,
        samples: &[f64],
        config: &CalibrationConfig,
    ) -> AppResult<JointCalibration> {
        if samples.len() < config.min_samples {
            return Err(AppError::calibration_failed(format!(
                "Collected {} samples for {joint}, need at least {}",
                samples.len(),
                config.min_samples
            )));
        }

        let filtered = if samples.len() >= config.median_window {
            median_filter(samples, config.median_window)
        } else {
            samples.to_vec()
        };
        let cleaned = reject_outliers(&filtered, config.outlier_mad_threshold);
        let outliers_removed = filtered.len() - cleaned.len();

        if cleaned.len() < config.min_clean_samples {
            return Err(AppError::calibration_failed(format!(
                "Only {} usable samples for {joint} after outlier rejection, need {}",
                cleaned.len(),
                config.min_clean_samples
            )));
        }

        let mut sorted = cleaned.clone();
        sorted.sort_by(f64::total_cmp);
        let max_angle = percentile(&sorted, config.max_percentile);
        let min_angle = percentile(&sorted, config.min_percentile);

        let sample_factor = (samples.len() as f64 / config.min_samples as f64).min(1.0);
        let inlier_fraction = cleaned.len() as f64 / filtered.len() as f64;
        let spread_factor = (1.0 - std_dev(&cleaned) / CONFIDENCE_STD_SPAN).max(0.0);
        let confidence = (sample_factor * inlier_fraction * spread_factor).clamp(0.0, 1.0);

        debug!(
            joint = %joint,
            raw = samples.len(),
            outliers_removed,
            max_angle,
            "Calibration samples processed"
        );

        Ok(JointCalibration {
            joint,
            max_angle,
            min_angle,
            confidence,
            num_samples: samples.len(),
            outliers_removed,
            state: CalibrationState::Completed,
            calibrated_at: Utc::now(),
        })
    }
}

/// Median of an unsorted slice; `None` when empty
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Sliding median with windows truncated at the edges
fn median_filter(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + window - half).min(values.len());
            median(&values[lo..hi]).unwrap_or(values[i])
        })
        .collect()
}

/// Keep points within `threshold` scaled MADs of the median
fn reject_outliers(values: &[f64], threshold: f64) -> Vec<f64> {
    let Some(center) = median(values) else {
        return Vec::new();
    };
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);
    let cutoff = threshold * MAD_SCALE * mad;
    values
        .iter()
        .zip(&deviations)
        .filter(|(_, &d)| d <= cutoff)
        .map(|(&v, _)| v)
        .collect()
}

/// Linear-interpolated percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            (sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower])
        }
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_filter_removes_single_spike() {
        let filtered = median_filter(&[10.0, 10.0, 90.0, 10.0, 10.0], 5);
        assert!(filtered.iter().all(|v| *v < 90.0));
    }

    #[test]
    fn test_zero_mad_keeps_only_median_points() {
        let kept = reject_outliers(&[5.0, 5.0, 5.0, 9.0], 3.0);
        assert_eq!(kept, vec![5.0, 5.0, 5.0]);
        let flat = reject_outliers(&[5.0, 5.0], 3.0);
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&sorted, 100.0) - 40.0).abs() < 1e-12);
        assert!((percentile(&sorted, 0.0) - 0.0).abs() < 1e-12);
        assert!((percentile(&sorted, 95.0) - 38.0).abs() < 1e-12);
    }
}
