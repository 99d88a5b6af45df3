// ABOUTME: Joint-angle geometry over landmark frames using a static joint definition table
// ABOUTME: Three-point angles, per-joint lookup, whole-skeleton sweeps and angular velocity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Kinematics Engine
//!
//! Angles are always reported in degrees within `[0, 180]`. Coincident points
//! are a [`DEGENERATE_GEOMETRY`](crate::errors::ErrorCode::DegenerateGeometry)
//! error from [`KinematicsEngine::angle`]; [`KinematicsEngine::safe_angle`]
//! substitutes a caller-supplied default instead.

use crate::config::KinematicsConfig;
use crate::constants::kinematics::DEGENERATE_EPSILON;
use crate::errors::{AppError, AppResult};
use crate::models::{JointTable, JointType, Landmark, LandmarkFrame, LandmarkRef};
use std::collections::BTreeMap;
use tracing::debug;

/// Joint angle calculator bound to a joint table
#[derive(Debug, Clone, Default)]
pub struct KinematicsEngine {
    table: JointTable,
    config: KinematicsConfig,
}

impl KinematicsEngine {
    /// Create an engine over `table`
    #[must_use]
    pub const fn new(table: JointTable, config: KinematicsConfig) -> Self {
        Self { table, config }
    }

    /// Joint table in use
    #[must_use]
    pub const fn table(&self) -> &JointTable {
        &self.table
    }

    /// Angle at vertex `b` between `b→a` and `b→c`, in degrees
    ///
    /// # Errors
    ///
    /// Returns `DEGENERATE_GEOMETRY` when either vector has (near) zero length
    pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark, use_3d: bool) -> AppResult<f64> {
        let depth = |p: &Landmark| if use_3d { p.z } else { 0.0 };
        let ba = [a.x - b.x, a.y - b.y, depth(a) - depth(b)];
        let bc = [c.x - b.x, c.y - b.y, depth(c) - depth(b)];

        let norm_ba = norm(ba);
        let norm_bc = norm(bc);
        if norm_ba < DEGENERATE_EPSILON || norm_bc < DEGENERATE_EPSILON {
            return Err(AppError::degenerate_geometry(
                "Cannot compute angle: a segment has zero length",
            ));
        }

        let dot = bc[2].mul_add(ba[2], ba[0].mul_add(bc[0], ba[1] * bc[1]));
        let cosine = (dot / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
        Ok(cosine.acos().to_degrees())
    }

    /// [`Self::angle`] that returns `default` instead of failing on degenerate geometry
    #[must_use]
    pub fn safe_angle(a: &Landmark, b: &Landmark, c: &Landmark, use_3d: bool, default: f64) -> f64 {
        Self::angle(a, b, c, use_3d).unwrap_or(default)
    }

    /// Angle of `joint` in `frame`.
    ///
    /// Returns `Ok(None)` when a landmark the joint needs is missing from the
    /// frame or below the visibility threshold.
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_JOINT` if the table has no definition for `joint`, and
    /// `DEGENERATE_GEOMETRY` if the landmarks coincide
    pub fn joint_angle(&self, frame: &LandmarkFrame, joint: JointType) -> AppResult<Option<f64>> {
        let definition = self.table.get(joint)?;
        let (Some(proximal), Some(vertex), Some(distal)) = (
            self.resolve(frame, definition.proximal),
            self.resolve(frame, definition.vertex),
            self.resolve(frame, definition.distal),
        ) else {
            return Ok(None);
        };
        Self::angle(&proximal, &vertex, &distal, self.config.use_3d).map(Some)
    }

    /// Angle of every joint in the table; joints that cannot be measured are left out
    #[must_use]
    pub fn all_joint_angles(&self, frame: &LandmarkFrame) -> BTreeMap<JointType, f64> {
        let mut angles = BTreeMap::new();
        for definition in self.table.iter() {
            match self.joint_angle(frame, definition.joint) {
                Ok(Some(angle)) => {
                    angles.insert(definition.joint, angle);
                }
                Ok(None) => {}
                Err(e) => debug!(joint = %definition.joint, error = %e, "Skipping joint"),
            }
        }
        angles
    }

    /// Whether `angle` falls inside the joint's clinically normal range
    ///
    /// # Errors
    ///
    /// Returns `UNKNOWN_JOINT` if the table has no definition for `joint`
    pub fn is_in_normal_range(&self, joint: JointType, angle: f64) -> AppResult<bool> {
        Ok(self.table.get(joint)?.normal_range.contains(angle))
    }

    /// Instantaneous angular velocity (degrees/second) by forward differences.
    ///
    /// The result is one element shorter than the input. A non-positive time
    /// step yields `0.0` for that sample.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` when `angles` and `timestamps_ms` differ in length
    pub fn angular_velocity(angles: &[f64], timestamps_ms: &[u64]) -> AppResult<Vec<f64>> {
        if angles.len() != timestamps_ms.len() {
            return Err(AppError::invalid_input(format!(
                "angular_velocity needs matching lengths, got {} angles and {} timestamps",
                angles.len(),
                timestamps_ms.len()
            )));
        }
        Ok(angles
            .windows(2)
            .zip(timestamps_ms.windows(2))
            .map(|(a, t)| {
                if t[1] <= t[0] {
                    return 0.0;
                }
                let dt_secs = (t[1] - t[0]) as f64 / 1000.0;
                (a[1] - a[0]) / dt_secs
            })
            .collect())
    }

    fn resolve(&self, frame: &LandmarkFrame, reference: LandmarkRef) -> Option<Landmark> {
        let landmark = match reference {
            LandmarkRef::Index(i) => *frame.get(i)?,
            LandmarkRef::Midpoint(a, b) => frame.get(a)?.midpoint(frame.get(b)?),
        };
        landmark
            .is_visible(self.config.min_visibility)
            .then_some(landmark)
    }
}

fn norm(v: [f64; 3]) -> f64 {
    v[2].mul_add(v[2], v[0].mul_add(v[0], v[1] * v[1])).sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_norm() {
        assert!((norm([3.0, 4.0, 0.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_2d_ignores_depth() {
        let a = Landmark::new(1.0, 0.0, 5.0);
        let b = Landmark::new(0.0, 0.0, 0.0);
        let c = Landmark::new(0.0, 1.0, -5.0);
        let angle = KinematicsEngine::angle(&a, &b, &c, false).unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
    }
}
