// ABOUTME: Configuration module for the rehab-intelligence crate
// ABOUTME: Re-exports engine configuration sections and the validation error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Engine Configuration
//!
//! Each algorithm takes its own section explicitly. [`EngineConfig::load`]
//! applies defaults, then environment overrides, then validation.

/// Aggregated engine configuration and per-component sections
pub mod engine;
/// Validation error type
pub mod error;

pub use engine::{
    CalibrationConfig, DetectionConfig, DtwConfig, EngineConfig, KinematicsConfig,
    NormalizerConfig, PainConfig, RescalingConfig, ScoringConfig, SyncConfig,
};
pub use error::ConfigError;
