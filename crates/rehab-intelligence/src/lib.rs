// ABOUTME: Motion analysis and synchronization algorithms for guided rehabilitation exercises
// ABOUTME: Kinematics, Procrustes alignment, DTW rhythm, calibration, rescaling, sync FSM and scoring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

#![deny(unsafe_code)]

//! # Rehab Intelligence
//!
//! Pure, synchronous algorithms that turn joint-angle streams into calibration
//! profiles, playback directives and repetition scores. Every component takes
//! its configuration explicitly; there is no global state.
//!
//! Leaf-first:
//! - [`kinematics`] - joint angles and angular velocity
//! - [`normalizer`] - Procrustes skeleton alignment
//! - [`dtw`] - weighted dynamic time warping
//! - [`calibration`] - safe-max calibration windows
//! - [`rescaling`] - personalized target trajectories
//! - [`synchronizer`] - the wait-for-user state machine
//! - [`scoring`] - per-rep scores, fatigue and session reports
//! - [`pain`] - pain episodes from an external facial score

// Re-export foundation modules so `crate::errors` etc. resolve inside this crate
pub use rehab_core::{constants, errors, models};

/// Validated engine configuration
pub mod config;

/// Joint angle geometry
pub mod kinematics;

/// Orthogonal Procrustes skeleton alignment
pub mod normalizer;

/// Dynamic time warping rhythm analysis
pub mod dtw;

/// Safe-max calibration
pub mod calibration;

/// Target trajectory rescaling
pub mod rescaling;

/// Wait-for-user synchronization controller
pub mod synchronizer;

/// Repetition scoring and session reports
pub mod scoring;

/// Pain episode tracking
pub mod pain;

pub use calibration::{CalibrationEngine, CalibrationOutcome, FrameOutcome};
pub use config::{ConfigError, EngineConfig};
pub use dtw::{DtwAnalyzer, DtwResult, RhythmQuality, SpeedAnalysis, WeightedDtwResult};
pub use kinematics::KinematicsEngine;
pub use normalizer::{AlignmentResult, NormalizedSkeleton, SkeletonNormalizer};
pub use pain::{PainEvent, PainLevel, PainMonitor, PainObservation, PainSummary};
pub use rescaling::{
    Direction, RescaledMotion, TargetClassification, TargetComparison, TargetRescaler,
    TargetTrajectory,
};
pub use scoring::{
    AverageScores, FatigueAnalysis, FatigueLevel, FatigueTrend, HealthScorer, RepScore,
    ScorerStatus, SessionReport,
};
pub use synchronizer::{SyncController, SyncState, SyncStatus};
