// ABOUTME: Per-user calibration profile holding the safe range of motion for each joint
// ABOUTME: Entries change only when a calibration completes; failed runs leave them untouched
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use super::joint::JointType;
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationState {
    /// Not started
    Idle,
    /// Collecting samples inside the timed window
    Collecting,
    /// Window closed, denoising samples
    Processing,
    /// A safe maximum was produced
    Completed,
    /// The window produced no usable result
    Error,
}

impl CalibrationState {
    /// Whether the run has reached a terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Calibrated range for one joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCalibration {
    /// Joint that was calibrated
    pub joint: JointType,
    /// Safe maximum angle (degrees)
    pub max_angle: f64,
    /// Minimum angle observed (degrees)
    pub min_angle: f64,
    /// Confidence in the result (0-1)
    pub confidence: f64,
    /// Raw samples collected in the window
    pub num_samples: usize,
    /// Samples removed as outliers
    pub outliers_removed: usize,
    /// State the run ended in
    pub state: CalibrationState,
    /// When the calibration finished
    pub calibrated_at: DateTime<Utc>,
}

impl JointCalibration {
    /// Observed range of motion (degrees)
    #[must_use]
    pub fn range_of_motion(&self) -> f64 {
        self.max_angle - self.min_angle
    }
}

/// A user's persistent calibration profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier (profile store key)
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Age in years, if known
    #[serde(default)]
    pub age: Option<u32>,
    /// Calibrated limits by joint
    #[serde(default)]
    pub joint_limits: BTreeMap<JointType, JointCalibration>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// When any joint was last calibrated
    #[serde(default)]
    pub last_calibration: Option<DateTime<Utc>>,
    /// Free-form clinician notes
    #[serde(default)]
    pub notes: String,
}

impl UserProfile {
    /// Create an empty profile
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            age: None,
            joint_limits: BTreeMap::new(),
            created_at: Utc::now(),
            last_calibration: None,
            notes: String::new(),
        }
    }

    /// Set the user's age
    #[must_use]
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    /// Record a calibration result.
    ///
    /// Replaces any previous entry for the joint, which makes this the explicit
    /// recalibration path.
    ///
    /// # Errors
    ///
    /// Returns `CALIBRATION_NOT_READY` when `calibration` did not complete; the
    /// existing entry is kept in that case.
    pub fn apply_calibration(&mut self, calibration: JointCalibration) -> AppResult<()> {
        if calibration.state != CalibrationState::Completed {
            return Err(AppError::calibration_not_ready(format!(
                "Refusing to store {:?} calibration for {}",
                calibration.state, calibration.joint
            ))
            .with_user_id(self.user_id.clone()));
        }
        self.last_calibration = Some(calibration.calibrated_at);
        self.joint_limits.insert(calibration.joint, calibration);
        Ok(())
    }

    /// Calibration entry for a joint
    #[must_use]
    pub fn calibration(&self, joint: JointType) -> Option<&JointCalibration> {
        self.joint_limits.get(&joint)
    }

    /// Safe maximum for a joint, if calibrated
    #[must_use]
    pub fn max_angle(&self, joint: JointType) -> Option<f64> {
        self.calibration(joint).map(|c| c.max_angle)
    }

    /// Whether a joint has a completed calibration
    #[must_use]
    pub fn is_calibrated(&self, joint: JointType) -> bool {
        self.joint_limits.contains_key(&joint)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns `SERIALIZATION_ERROR` if serialization fails
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a profile from JSON
    ///
    /// # Errors
    ///
    /// Returns `SERIALIZATION_ERROR` on malformed input
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
