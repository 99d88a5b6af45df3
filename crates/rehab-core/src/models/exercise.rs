// ABOUTME: Exercise templates with reference angle trajectories and phase checkpoints
// ABOUTME: Defines motion phases and the standard arm-raise template used for sync sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use super::joint::JointType;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Phase of one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionPhase {
    /// At rest between repetitions
    Idle,
    /// Moving away from rest toward the peak
    Eccentric,
    /// Holding the peak
    Hold,
    /// Returning to rest
    Concentric,
}

impl fmt::Display for MotionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Eccentric => "ECCENTRIC",
            Self::Hold => "HOLD",
            Self::Concentric => "CONCENTRIC",
        };
        f.write_str(name)
    }
}

/// Exercise family, used to pick joint weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    /// Shoulder abduction / flexion
    ArmRaise,
    /// Knee and hip flexion
    Squat,
    /// Elbow flexion
    BicepCurl,
}

impl ExerciseType {
    /// Infer the exercise family from the joint that drives it
    #[must_use]
    pub const fn from_primary_joint(joint: JointType) -> Self {
        if joint.is_elbow() {
            Self::BicepCurl
        } else if joint.is_knee() {
            Self::Squat
        } else {
            Self::ArmRaise
        }
    }

    /// DTW weight preset for one joint; joints the preset does not name get `default_weight`
    #[must_use]
    pub const fn joint_weight(self, joint: JointType, default_weight: f64) -> f64 {
        let (shoulder, elbow, hip, knee) = match self {
            Self::ArmRaise => (1.0, 0.6, 0.2, 0.1),
            Self::Squat => (0.2, 0.1, 0.8, 1.0),
            Self::BicepCurl => (0.5, 1.0, 0.2, 0.1),
        };
        if joint.is_shoulder() {
            shoulder
        } else if joint.is_elbow() {
            elbow
        } else if joint.is_hip() {
            hip
        } else if joint.is_knee() {
            knee
        } else {
            default_weight
        }
    }

    /// Weight preset for every joint
    #[must_use]
    pub fn joint_weights(self, default_weight: f64) -> BTreeMap<JointType, f64> {
        JointType::ALL
            .into_iter()
            .map(|joint| (joint, self.joint_weight(joint, default_weight)))
            .collect()
    }
}

/// A point in the reference video where the motion enters a new phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Reference frame at which the phase begins
    pub frame_index: u32,
    /// Phase entered at this checkpoint
    pub phase: MotionPhase,
    /// Instruction shown to the user
    pub message: String,
}

impl Checkpoint {
    /// Create a checkpoint
    pub fn new(frame_index: u32, phase: MotionPhase, message: impl Into<String>) -> Self {
        Self {
            frame_index,
            phase,
            message: message.into(),
        }
    }
}

/// Immutable exercise template created at session setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    name: String,
    exercise_type: ExerciseType,
    primary_joint: JointType,
    fps: f64,
    reference_angles: Vec<f64>,
    checkpoints: Vec<Checkpoint>,
}

/// Fractions of a repetition where the arm-raise checkpoints sit
const ARM_RAISE_LAYOUT: [(f64, MotionPhase, bool, &str); 4] = [
    (0.1, MotionPhase::Eccentric, false, "Raise your arm slowly"),
    (0.4, MotionPhase::Hold, true, "Hold the position"),
    (0.6, MotionPhase::Concentric, true, "Lower your arm slowly"),
    (0.9, MotionPhase::Idle, false, "Rest"),
];

/// Shortest repetition the arm-raise layout can place four checkpoints in
const MIN_FRAMES_PER_REP: u32 = 10;

impl ExerciseDefinition {
    /// Create and validate an exercise definition
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` when fps is not positive, the reference is empty,
    /// or checkpoints are not strictly increasing inside the reference
    pub fn new(
        name: impl Into<String>,
        exercise_type: ExerciseType,
        primary_joint: JointType,
        fps: f64,
        reference_angles: Vec<f64>,
        checkpoints: Vec<Checkpoint>,
    ) -> AppResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(AppError::config_invalid(format!(
                "Exercise fps must be positive, got {fps}"
            )));
        }
        if reference_angles.is_empty() {
            return Err(AppError::config_invalid(
                "Exercise reference trajectory is empty",
            ));
        }
        let total = reference_angles.len();
        let mut previous: Option<u32> = None;
        for checkpoint in &checkpoints {
            if checkpoint.frame_index as usize >= total {
                return Err(AppError::config_invalid(format!(
                    "Checkpoint frame {} outside reference of {total} frames",
                    checkpoint.frame_index
                )));
            }
            if previous.is_some_and(|p| checkpoint.frame_index <= p) {
                return Err(AppError::config_invalid(
                    "Checkpoint frames must be strictly increasing",
                ));
            }
            previous = Some(checkpoint.frame_index);
        }

        Ok(Self {
            name: name.into(),
            exercise_type,
            primary_joint,
            fps,
            reference_angles,
            checkpoints,
        })
    }

    /// Standard arm-raise template driven by the left shoulder.
    ///
    /// Each repetition spans `total_frames / reps` frames with checkpoints at
    /// 10/40/60/90 % of the span; the reference rests at 0 degrees and plateaus
    /// at `max_angle` between the HOLD and CONCENTRIC checkpoints.
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` when `reps` is zero, a repetition would be
    /// shorter than ten frames, or the angle or fps is out of range
    pub fn arm_raise(total_frames: u32, fps: f64, max_angle: f64, reps: u32) -> AppResult<Self> {
        if reps == 0 {
            return Err(AppError::config_invalid("Exercise needs at least one repetition"));
        }
        if !(0.0..=180.0).contains(&max_angle) || max_angle <= 0.0 {
            return Err(AppError::config_invalid(format!(
                "Arm raise peak must be in (0, 180], got {max_angle}"
            )));
        }
        let span = total_frames / reps;
        if span < MIN_FRAMES_PER_REP {
            return Err(AppError::config_invalid(format!(
                "Repetition of {span} frames is too short for the arm raise layout"
            )));
        }

        let mut keyframes: Vec<(u32, f64)> = Vec::with_capacity(reps as usize * 5 + 1);
        let mut checkpoints = Vec::with_capacity(reps as usize * ARM_RAISE_LAYOUT.len());
        for rep in 0..reps {
            let base = rep * span;
            keyframes.push((base, 0.0));
            for (fraction, phase, at_peak, message) in ARM_RAISE_LAYOUT {
                let frame = base + (f64::from(span) * fraction).round() as u32;
                keyframes.push((frame, if at_peak { max_angle } else { 0.0 }));
                checkpoints.push(Checkpoint::new(frame, phase, message));
            }
        }
        keyframes.push((total_frames.saturating_sub(1), 0.0));

        let reference_angles = (0..total_frames)
            .map(|frame| interpolate_keyframes(&keyframes, frame))
            .collect();

        Self::new(
            "arm_raise",
            ExerciseType::ArmRaise,
            JointType::LeftShoulder,
            fps,
            reference_angles,
            checkpoints,
        )
    }

    /// Exercise name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exercise family
    #[must_use]
    pub const fn exercise_type(&self) -> ExerciseType {
        self.exercise_type
    }

    /// Joint whose angle drives synchronization
    #[must_use]
    pub const fn primary_joint(&self) -> JointType {
        self.primary_joint
    }

    /// Reference video frame rate
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps
    }

    /// Reference angle for every reference frame
    #[must_use]
    pub fn reference_angles(&self) -> &[f64] {
        &self.reference_angles
    }

    /// Phase checkpoints in frame order
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Number of reference frames
    #[must_use]
    pub fn total_frames(&self) -> u32 {
        self.reference_angles.len() as u32
    }

    /// Largest angle in the reference trajectory
    #[must_use]
    pub fn reference_max(&self) -> f64 {
        self.reference_angles
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Milliseconds at which a reference frame is shown
    #[must_use]
    pub fn frame_to_ms(&self, frame: u32) -> f64 {
        f64::from(frame) * 1000.0 / self.fps
    }

    /// Playback duration of the reference (ms)
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.reference_angles.len() as f64 * 1000.0 / self.fps
    }

    /// Phase the reference is in at `frame`
    #[must_use]
    pub fn phase_at(&self, frame: u32) -> MotionPhase {
        self.checkpoints
            .iter()
            .take_while(|c| c.frame_index <= frame)
            .last()
            .map_or(MotionPhase::Idle, |c| c.phase)
    }

    /// Joints to calibrate before syncing: the primary joint, then its mirror
    #[must_use]
    pub fn calibration_joints(&self) -> Vec<JointType> {
        let mirror = self.primary_joint.mirror();
        if mirror == self.primary_joint {
            vec![self.primary_joint]
        } else {
            vec![self.primary_joint, mirror]
        }
    }
}

/// Piecewise-linear value at `frame` from sorted `(frame, value)` keyframes
fn interpolate_keyframes(keyframes: &[(u32, f64)], frame: u32) -> f64 {
    let Some(&(first_frame, first_value)) = keyframes.first() else {
        return 0.0;
    };
    if frame <= first_frame {
        return first_value;
    }
    for pair in keyframes.windows(2) {
        let (f0, v0) = pair[0];
        let (f1, v1) = pair[1];
        if frame <= f1 {
            if f1 == f0 {
                return v1;
            }
            let t = f64::from(frame - f0) / f64::from(f1 - f0);
            return (v1 - v0).mul_add(t, v0);
        }
    }
    keyframes.last().map_or(0.0, |&(_, v)| v)
}
