// ABOUTME: Core types and constants for the rehab motion sync engine
// ABOUTME: Foundation crate with error handling, landmark/joint models, profiles, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

#![deny(unsafe_code)]

//! # Rehab Core
//!
//! Foundation crate providing shared types and constants for the rehab motion
//! sync engine. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Landmark indices and algorithm defaults organized by domain
//! - **models**: Landmark frames, joint table, calibration profiles, exercise templates

/// Unified error handling system with standard error codes
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (landmarks, joints, profiles, exercises)
pub mod models;
