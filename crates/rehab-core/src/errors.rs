// ABOUTME: Unified error handling with numbered error codes and contextual AppError
// ABOUTME: Separates degenerate geometry, configuration, data-quality and calibration failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Unified Error Handling System
//!
//! Every fallible operation in the engine returns [`AppResult`]. Error codes are
//! grouped by range so callers can tell apart caller bugs (configuration range,
//! fatal to a session) from recoverable conditions such as degenerate geometry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Standard error codes used throughout the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (3000-3999)
    /// Input data failed validation
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    /// A required field was absent
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField = 3001,
    /// Data could not be parsed
    #[serde(rename = "INVALID_FORMAT")]
    InvalidFormat = 3002,
    /// Numeric value outside its allowed range
    #[serde(rename = "VALUE_OUT_OF_RANGE")]
    ValueOutOfRange = 3003,

    // Resource Management (4000-4999)
    /// Session or profile does not exist
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    /// Session or profile already exists
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists = 4001,

    // Configuration (6000-6999)
    /// Generic configuration error
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    /// Configuration failed validation
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,
    /// Joint type is not part of the joint table
    #[serde(rename = "UNKNOWN_JOINT")]
    UnknownJoint = 6003,
    /// Two landmark sets have different shapes
    #[serde(rename = "SHAPE_MISMATCH")]
    ShapeMismatch = 6004,
    /// Reference motion has no amplitude to rescale
    #[serde(rename = "ZERO_REFERENCE_AMPLITUDE")]
    ZeroReferenceAmplitude = 6005,

    // Geometry (7000-7999)
    /// Coincident points make an angle undefined
    #[serde(rename = "DEGENERATE_GEOMETRY")]
    DegenerateGeometry = 7000,

    // Calibration (8000-8999)
    /// No usable samples were collected in the window
    #[serde(rename = "CALIBRATION_FAILED")]
    CalibrationFailed = 8000,
    /// Calibration operation issued in the wrong state
    #[serde(rename = "CALIBRATION_NOT_READY")]
    CalibrationNotReady = 8001,

    // Internal Errors (9000-9999)
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Profile storage failed
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9002,
    /// Serialization or deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Numeric code as transmitted to clients
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether this error must terminate the session.
    ///
    /// Only configuration errors are caller bugs; everything else is handled
    /// best-effort so an exercise session keeps running.
    #[must_use]
    pub const fn is_session_fatal(self) -> bool {
        matches!(
            self,
            Self::ConfigError
                | Self::ConfigInvalid
                | Self::UnknownJoint
                | Self::ShapeMismatch
                | Self::ZeroReferenceAmplitude
        )
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing",
            Self::InvalidFormat => "The data format is invalid",
            Self::ValueOutOfRange => "The provided value is outside the acceptable range",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::UnknownJoint => "Joint type is not defined in the joint table",
            Self::ShapeMismatch => "Landmark sets have mismatched shapes",
            Self::ZeroReferenceAmplitude => "Reference motion has zero amplitude",
            Self::DegenerateGeometry => "Geometry is degenerate (coincident points)",
            Self::CalibrationFailed => "Calibration did not collect enough usable samples",
            Self::CalibrationNotReady => "Calibration is not in a state that allows this operation",
            Self::InternalError => "An internal error occurred",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u32())
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Session the error occurred in
    pub session_id: Option<Uuid>,
    /// User the error relates to
    pub user_id: Option<String>,
    /// Additional key-value context
    pub details: Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            session_id: None,
            user_id: None,
            details: Value::Object(Map::new()),
        }
    }
}

/// Unified error type for the engine
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Attach the session the error occurred in
    #[must_use]
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.context.session_id = Some(session_id);
        self
    }

    /// Attach the user the error relates to
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.context.user_id = Some(user_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.context.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether this error must terminate the session
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        self.code.is_session_fatal()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Value outside its allowed range
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValueOutOfRange, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Configuration failed validation
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Joint missing from the joint table
    pub fn unknown_joint(joint: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnknownJoint,
            format!("Unknown joint type: {}", joint.into()),
        )
    }

    /// Landmark sets with different shapes
    #[must_use]
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            ErrorCode::ShapeMismatch,
            format!("Landmark count mismatch: reference has {expected}, target has {actual}"),
        )
        .with_details(json!({
            "expected": expected,
            "actual": actual,
        }))
    }

    /// Reference motion maximum is approximately zero
    #[must_use]
    pub fn zero_reference_amplitude(ref_max: f64) -> Self {
        Self::new(
            ErrorCode::ZeroReferenceAmplitude,
            format!("Reference maximum angle {ref_max:.3} is too small to rescale"),
        )
    }

    /// Coincident points in an angle calculation
    pub fn degenerate_geometry(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DegenerateGeometry, message)
    }

    /// Calibration window yielded no usable result
    pub fn calibration_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CalibrationFailed, message)
    }

    /// Calibration call made in the wrong state
    pub fn calibration_not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CalibrationNotReady, message)
    }

    /// Storage failure
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, error.to_string()).with_source(error)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::new(ErrorCode::StorageError, error.to_string()).with_source(error)
    }
}
