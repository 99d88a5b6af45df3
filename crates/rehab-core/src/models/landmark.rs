// ABOUTME: Landmark point and frame models produced by the external pose detector
// ABOUTME: Frames are immutable once created and tolerate explicit "no detection" results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use serde::{Deserialize, Serialize};

/// A single body landmark in detector coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
    /// Depth coordinate
    pub z: f64,
    /// Detector confidence that the point is visible (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    /// Create a landmark without visibility information
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    /// Attach a visibility score
    #[must_use]
    pub const fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Whether the landmark is visible enough to measure.
    ///
    /// Landmarks without a visibility score are trusted.
    #[must_use]
    pub fn is_visible(&self, min_visibility: f64) -> bool {
        self.visibility.is_none_or(|v| v >= min_visibility)
    }

    /// Midpoint of two landmarks; visibility is the lower of the two
    #[must_use]
    pub fn midpoint(&self, other: &Self) -> Self {
        let visibility = match (self.visibility, other.visibility) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
            visibility,
        }
    }

    /// Coordinates as an array
    #[must_use]
    pub const fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Landmarks detected in one camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    timestamp_ms: u64,
    landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    /// Create a frame from detector output
    #[must_use]
    pub const fn new(timestamp_ms: u64, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            landmarks,
        }
    }

    /// Create a frame from raw `[x, y, z]` points
    #[must_use]
    pub fn from_points(timestamp_ms: u64, points: &[[f64; 3]]) -> Self {
        let landmarks = points
            .iter()
            .map(|[x, y, z]| Landmark::new(*x, *y, *z))
            .collect();
        Self::new(timestamp_ms, landmarks)
    }

    /// Capture timestamp in milliseconds
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// All landmarks in scheme order
    #[must_use]
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Landmark at `index`, if the frame has it
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// Number of landmarks in the frame
    #[must_use]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Whether the frame carries no landmarks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Result of running the pose detector on one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "frame", rename_all = "snake_case")]
pub enum PoseDetection {
    /// A body was found
    Detected(LandmarkFrame),
    /// No body in view
    NoDetection,
}

impl PoseDetection {
    /// Borrow the frame when a body was detected
    #[must_use]
    pub const fn frame(&self) -> Option<&LandmarkFrame> {
        match self {
            Self::Detected(frame) => Some(frame),
            Self::NoDetection => None,
        }
    }

    /// Whether a body was detected
    #[must_use]
    pub const fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}
