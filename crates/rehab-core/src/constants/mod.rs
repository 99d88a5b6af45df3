// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Landmark indices and algorithm defaults grouped by engine component
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Constants module
//!
//! Constants are grouped by the component that owns them. Tunable values here
//! are only defaults; the validated runtime configuration lives in
//! `rehab_intelligence::config`.

/// Body landmark indices of the 33-point pose scheme
pub mod landmarks;

/// Numeric defaults for the motion analysis algorithms
pub mod algorithms;

pub use algorithms::*;

/// Service identification for structured logging
pub mod service_names {
    /// Service name reported in startup logs
    pub const REHAB_SYNC_ENGINE: &str = "rehab-sync-engine";
}
