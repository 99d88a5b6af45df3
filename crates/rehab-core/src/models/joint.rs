// ABOUTME: Tracked joint types and the static joint definition table
// ABOUTME: Maps each joint to proximal/vertex/distal landmarks and a normal angle range
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use crate::constants::landmarks::{
    LEFT_ANKLE, LEFT_ELBOW, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, LEFT_WRIST, NOSE, RIGHT_ANKLE,
    RIGHT_ELBOW, RIGHT_HIP, RIGHT_KNEE, RIGHT_SHOULDER, RIGHT_WRIST,
};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Joints tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    /// Left shoulder (hip-shoulder-elbow)
    LeftShoulder,
    /// Right shoulder (hip-shoulder-elbow)
    RightShoulder,
    /// Left elbow (shoulder-elbow-wrist)
    LeftElbow,
    /// Right elbow (shoulder-elbow-wrist)
    RightElbow,
    /// Left hip (shoulder-hip-knee)
    LeftHip,
    /// Right hip (shoulder-hip-knee)
    RightHip,
    /// Left knee (hip-knee-ankle)
    LeftKnee,
    /// Right knee (hip-knee-ankle)
    RightKnee,
    /// Trunk flexion measured at the hip midpoint
    Spine,
    /// Head flexion measured at the shoulder midpoint
    Neck,
}

impl JointType {
    /// Every joint in table order
    pub const ALL: [Self; 10] = [
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::Spine,
        Self::Neck,
    ];

    /// Snake-case identifier used in configuration and JSON
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::Spine => "spine",
            Self::Neck => "neck",
        }
    }

    /// Opposite-side joint; midline joints mirror to themselves
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::LeftShoulder => Self::RightShoulder,
            Self::RightShoulder => Self::LeftShoulder,
            Self::LeftElbow => Self::RightElbow,
            Self::RightElbow => Self::LeftElbow,
            Self::LeftHip => Self::RightHip,
            Self::RightHip => Self::LeftHip,
            Self::LeftKnee => Self::RightKnee,
            Self::RightKnee => Self::LeftKnee,
            Self::Spine => Self::Spine,
            Self::Neck => Self::Neck,
        }
    }

    /// Whether this is a shoulder joint
    #[must_use]
    pub const fn is_shoulder(self) -> bool {
        matches!(self, Self::LeftShoulder | Self::RightShoulder)
    }

    /// Whether this is an elbow joint
    #[must_use]
    pub const fn is_elbow(self) -> bool {
        matches!(self, Self::LeftElbow | Self::RightElbow)
    }

    /// Whether this is a hip joint
    #[must_use]
    pub const fn is_hip(self) -> bool {
        matches!(self, Self::LeftHip | Self::RightHip)
    }

    /// Whether this is a knee joint
    #[must_use]
    pub const fn is_knee(self) -> bool {
        matches!(self, Self::LeftKnee | Self::RightKnee)
    }
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|joint| joint.as_str() == normalized)
            .ok_or_else(|| AppError::unknown_joint(s))
    }
}

/// Landmark reference used as a joint endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRef {
    /// A single landmark by index
    Index(usize),
    /// Midpoint of two landmarks
    Midpoint(usize, usize),
}

impl LandmarkRef {
    /// Highest landmark index this reference reads
    #[must_use]
    pub const fn max_index(self) -> usize {
        match self {
            Self::Index(i) => i,
            Self::Midpoint(a, b) => {
                if a > b {
                    a
                } else {
                    b
                }
            }
        }
    }
}

/// Inclusive angle range in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    /// Lower bound (degrees)
    pub min: f64,
    /// Upper bound (degrees)
    pub max: f64,
}

impl AngleRange {
    /// Create a range
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `angle` lies inside the range
    #[must_use]
    pub fn contains(&self, angle: f64) -> bool {
        (self.min..=self.max).contains(&angle)
    }
}

/// Definition of one measurable joint angle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDefinition {
    /// Joint this definition measures
    pub joint: JointType,
    /// Point on the proximal segment
    pub proximal: LandmarkRef,
    /// Angle vertex
    pub vertex: LandmarkRef,
    /// Point on the distal segment
    pub distal: LandmarkRef,
    /// Human-readable name
    pub display_name: String,
    /// Clinically normal range of motion
    pub normal_range: AngleRange,
}

impl JointDefinition {
    /// Create a definition from single-landmark endpoints
    #[must_use]
    pub fn from_indices(
        joint: JointType,
        (proximal, vertex, distal): (usize, usize, usize),
        display_name: &str,
        normal_range: AngleRange,
    ) -> Self {
        Self {
            joint,
            proximal: LandmarkRef::Index(proximal),
            vertex: LandmarkRef::Index(vertex),
            distal: LandmarkRef::Index(distal),
            display_name: display_name.to_owned(),
            normal_range,
        }
    }
}

/// Lookup table from joint type to definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTable {
    definitions: BTreeMap<JointType, JointDefinition>,
}

impl Default for JointTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl JointTable {
    /// Standard table covering every [`JointType`]
    #[must_use]
    pub fn standard() -> Self {
        let mid_shoulder = LandmarkRef::Midpoint(LEFT_SHOULDER, RIGHT_SHOULDER);
        let mid_hip = LandmarkRef::Midpoint(LEFT_HIP, RIGHT_HIP);
        let mid_knee = LandmarkRef::Midpoint(LEFT_KNEE, RIGHT_KNEE);

        let mut definitions = vec![
            JointDefinition::from_indices(
                JointType::LeftElbow,
                (LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST),
                "Left Elbow",
                AngleRange::new(0.0, 145.0),
            ),
            JointDefinition::from_indices(
                JointType::RightElbow,
                (RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST),
                "Right Elbow",
                AngleRange::new(0.0, 145.0),
            ),
            JointDefinition::from_indices(
                JointType::LeftShoulder,
                (LEFT_HIP, LEFT_SHOULDER, LEFT_ELBOW),
                "Left Shoulder",
                AngleRange::new(0.0, 180.0),
            ),
            JointDefinition::from_indices(
                JointType::RightShoulder,
                (RIGHT_HIP, RIGHT_SHOULDER, RIGHT_ELBOW),
                "Right Shoulder",
                AngleRange::new(0.0, 180.0),
            ),
            JointDefinition::from_indices(
                JointType::LeftHip,
                (LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE),
                "Left Hip",
                AngleRange::new(0.0, 125.0),
            ),
            JointDefinition::from_indices(
                JointType::RightHip,
                (RIGHT_SHOULDER, RIGHT_HIP, RIGHT_KNEE),
                "Right Hip",
                AngleRange::new(0.0, 125.0),
            ),
            JointDefinition::from_indices(
                JointType::LeftKnee,
                (LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
                "Left Knee",
                AngleRange::new(0.0, 140.0),
            ),
            JointDefinition::from_indices(
                JointType::RightKnee,
                (RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
                "Right Knee",
                AngleRange::new(0.0, 140.0),
            ),
        ];
        definitions.push(JointDefinition {
            joint: JointType::Spine,
            proximal: mid_shoulder,
            vertex: mid_hip,
            distal: mid_knee,
            display_name: "Spine".to_owned(),
            normal_range: AngleRange::new(0.0, 180.0),
        });
        definitions.push(JointDefinition {
            joint: JointType::Neck,
            proximal: LandmarkRef::Index(NOSE),
            vertex: mid_shoulder,
            distal: mid_hip,
            display_name: "Neck".to_owned(),
            normal_range: AngleRange::new(0.0, 180.0),
        });

        Self::with_definitions(definitions)
    }

    /// Build a custom table; later definitions replace earlier ones for the same joint
    #[must_use]
    pub fn with_definitions(definitions: impl IntoIterator<Item = JointDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.joint, definition))
                .collect(),
        }
    }

    /// Look up a joint definition
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_JOINT` if the table has no entry for `joint`
    pub fn get(&self, joint: JointType) -> AppResult<&JointDefinition> {
        self.definitions
            .get(&joint)
            .ok_or_else(|| AppError::unknown_joint(joint.as_str()))
    }

    /// Definitions in joint order
    pub fn iter(&self) -> impl Iterator<Item = &JointDefinition> {
        self.definitions.values()
    }

    /// Number of joints in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
