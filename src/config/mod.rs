// ABOUTME: Configuration module for the calling layer of the motion engine
// ABOUTME: Combines deployment environment, logging and algorithm configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

/// Environment-driven runtime configuration
pub mod environment;

pub use crate::intelligence::config::{
    CalibrationConfig, ConfigError, DetectionConfig, DtwConfig, EngineConfig, KinematicsConfig,
    NormalizerConfig, PainConfig, RescalingConfig, ScoringConfig, SyncConfig,
};
pub use environment::{Environment, RuntimeConfig};
