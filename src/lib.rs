// ABOUTME: Main library entry point for the rehab motion sync engine
// ABOUTME: Hosts per-session engines that turn landmark streams into sync directives and scores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

#![deny(unsafe_code)]

//! # Rehab Sync Engine
//!
//! Guided rehabilitation in front of a camera: a pose detector supplies body
//! landmarks, and this crate turns them into a personal safe range of motion,
//! a wait-for-user signal that paces the reference video, and per-repetition
//! scores with fatigue and pain heuristics.
//!
//! ## Architecture
//!
//! - **`rehab-core`**: errors, landmark and joint models, profiles, constants
//! - **`rehab-intelligence`**: the synchronous algorithms
//! - **this crate**: logging, configuration, session events, profile
//!   storage, the per-frame [`engine::MotionEngine`], the
//!   [`session_store::SessionStore`] and the tokio [`pain_worker`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rehab_sync_engine::engine::{FrameInput, MotionEngine};
//! use rehab_sync_engine::events::TracingEventSink;
//! use rehab_sync_engine::intelligence::EngineConfig;
//! use rehab_sync_engine::models::{ExerciseDefinition, PoseDetection, UserProfile};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # fn main() -> rehab_sync_engine::errors::AppResult<()> {
//! let exercise = ExerciseDefinition::arm_raise(300, 30.0, 150.0, 3)?;
//! let mut engine = MotionEngine::new(
//!     Uuid::new_v4(),
//!     UserProfile::new("user-1", "Alex"),
//!     exercise,
//!     EngineConfig::default(),
//!     Arc::new(TracingEventSink),
//! )?;
//! let output = engine.process_frame(&FrameInput::new(0, PoseDetection::NoDetection))?;
//! assert_eq!(output.phase_name, "detection");
//! # Ok(())
//! # }
//! ```

pub use rehab_core::{constants, errors, models};

/// Algorithm crate
pub use rehab_intelligence as intelligence;

/// Runtime and engine configuration
pub mod config;

/// Per-session frame processing
pub mod engine;

/// Session events and sinks
pub mod events;

/// Structured logging setup
pub mod logging;

/// Background pain-signal worker
pub mod pain_worker;

/// Calibration profile persistence
pub mod profile_store;

/// Caller-owned session registry
pub mod session_store;
