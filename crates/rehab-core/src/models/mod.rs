// ABOUTME: Core data models for landmark frames, joints, calibration profiles and exercises
// ABOUTME: Shared by the algorithm crate and the per-frame session layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Data models
//!
//! Landmark frames are produced by the external pose detector and never mutated.
//! Joint definitions and exercise templates are static configuration.
//! Calibration profiles change only through a completed calibration.

/// Landmark points, frames and detector results
pub mod landmark;

/// Joint types and the joint definition table
pub mod joint;

/// Per-user calibration profile
pub mod profile;

/// Exercise templates, motion phases and checkpoints
pub mod exercise;

pub use exercise::{Checkpoint, ExerciseDefinition, ExerciseType, MotionPhase};
pub use joint::{AngleRange, JointDefinition, JointTable, JointType, LandmarkRef};
pub use landmark::{Landmark, LandmarkFrame, PoseDetection};
pub use profile::{CalibrationState, JointCalibration, UserProfile};
