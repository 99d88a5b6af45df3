// ABOUTME: Session event model and the record-event sink interface
// ABOUTME: Flattens events to key-value records for tracing or in-memory collection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Session Events
//!
//! The engine reports session milestones through [`SessionEventSink`]. Each
//! event flattens to a `serde_json::Map` with an `event` discriminator and a
//! `timestamp_ms` key so sinks can store it without knowing the variant.

use crate::intelligence::{FatigueLevel, PainLevel};
use crate::models::JointType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// Milestones emitted during a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was created
    SessionStarted {
        /// Session identifier
        session_id: Uuid,
        /// User the session belongs to
        user_id: String,
        /// Exercise performed
        exercise_name: String,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// A joint received a new safe maximum
    CalibrationCompleted {
        /// Session identifier
        session_id: Uuid,
        /// Calibrated joint
        joint: JointType,
        /// Safe maximum (degrees)
        max_angle: f64,
        /// Confidence (0-1)
        confidence: f64,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// A calibration window produced no result
    CalibrationFailed {
        /// Session identifier
        session_id: Uuid,
        /// Joint being calibrated
        joint: JointType,
        /// Failure reason
        reason: String,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// A repetition was scored
    RepCompleted {
        /// Session identifier
        session_id: Uuid,
        /// 1-based repetition number
        rep_number: u32,
        /// Total score (0-100)
        total_score: f64,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// Jerk indicates moderate or heavy fatigue
    FatigueWarning {
        /// Session identifier
        session_id: Uuid,
        /// Current fatigue level
        level: FatigueLevel,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// A pain episode became sustained
    PainWarning {
        /// Session identifier
        session_id: Uuid,
        /// Worst level of the episode so far
        level: PainLevel,
        /// Event time (ms)
        timestamp_ms: u64,
    },
    /// The session report was produced
    SessionEnded {
        /// Session identifier
        session_id: Uuid,
        /// Repetitions scored
        total_reps: usize,
        /// Mean total score
        average_score: f64,
        /// Event time (ms)
        timestamp_ms: u64,
    },
}

impl SessionEvent {
    /// Discriminator used as the `event` key
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::CalibrationCompleted { .. } => "calibration_completed",
            Self::CalibrationFailed { .. } => "calibration_failed",
            Self::RepCompleted { .. } => "rep_completed",
            Self::FatigueWarning { .. } => "fatigue_warning",
            Self::PainWarning { .. } => "pain_warning",
            Self::SessionEnded { .. } => "session_ended",
        }
    }

    /// Session the event belongs to
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::CalibrationCompleted { session_id, .. }
            | Self::CalibrationFailed { session_id, .. }
            | Self::RepCompleted { session_id, .. }
            | Self::FatigueWarning { session_id, .. }
            | Self::PainWarning { session_id, .. }
            | Self::SessionEnded { session_id, .. } => *session_id,
        }
    }

    /// Event time (ms)
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        match self {
            Self::SessionStarted { timestamp_ms, .. }
            | Self::CalibrationCompleted { timestamp_ms, .. }
            | Self::CalibrationFailed { timestamp_ms, .. }
            | Self::RepCompleted { timestamp_ms, .. }
            | Self::FatigueWarning { timestamp_ms, .. }
            | Self::PainWarning { timestamp_ms, .. }
            | Self::SessionEnded { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Whether the event should be surfaced as a warning
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::CalibrationFailed { .. } | Self::FatigueWarning { .. } | Self::PainWarning { .. }
        )
    }

    /// Flat key-value record with `event` and `timestamp_ms` keys
    #[must_use]
    pub fn to_record(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Every variant is a struct with plain fields; keep the two mandatory keys regardless
            _ => {
                let mut map = Map::new();
                map.insert("event".to_owned(), Value::from(self.name()));
                map.insert("timestamp_ms".to_owned(), Value::from(self.timestamp_ms()));
                map
            }
        }
    }
}

/// Destination for session events
pub trait SessionEventSink: Send + Sync {
    /// Record one event; must not block frame processing
    fn record(&self, event: &SessionEvent);
}

/// Emits each event as one structured tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl SessionEventSink for TracingEventSink {
    fn record(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SessionStarted {
                session_id,
                user_id,
                exercise_name,
                timestamp_ms,
            } => info!(
                session.id = %session_id,
                user.id = %user_id,
                exercise = %exercise_name,
                timestamp_ms,
                "Session started"
            ),
            SessionEvent::CalibrationCompleted {
                session_id,
                joint,
                max_angle,
                confidence,
                timestamp_ms,
            } => info!(
                session.id = %session_id,
                calibration.joint = %joint,
                calibration.max_angle = max_angle,
                calibration.confidence = confidence,
                timestamp_ms,
                "Calibration completed"
            ),
            SessionEvent::CalibrationFailed {
                session_id,
                joint,
                reason,
                timestamp_ms,
            } => warn!(
                session.id = %session_id,
                calibration.joint = %joint,
                calibration.reason = %reason,
                timestamp_ms,
                "Calibration failed"
            ),
            SessionEvent::RepCompleted {
                session_id,
                rep_number,
                total_score,
                timestamp_ms,
            } => info!(
                session.id = %session_id,
                rep.number = rep_number,
                rep.total_score = total_score,
                timestamp_ms,
                "Rep completed"
            ),
            SessionEvent::FatigueWarning {
                session_id,
                level,
                timestamp_ms,
            } => warn!(
                session.id = %session_id,
                fatigue.level = %level,
                timestamp_ms,
                "Fatigue warning"
            ),
            SessionEvent::PainWarning {
                session_id,
                level,
                timestamp_ms,
            } => warn!(
                session.id = %session_id,
                pain.level = %level,
                timestamp_ms,
                "Pain warning"
            ),
            SessionEvent::SessionEnded {
                session_id,
                total_reps,
                average_score,
                timestamp_ms,
            } => info!(
                session.id = %session_id,
                session.total_reps = total_reps,
                session.average_score = average_score,
                timestamp_ms,
                "Session ended"
            ),
        }
    }
}

/// Collects flattened records in memory
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    records: Mutex<Vec<Map<String, Value>>>,
}

impl MemoryEventSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far
    #[must_use]
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records whose `event` key equals `name`
    #[must_use]
    pub fn records_named(&self, name: &str) -> Vec<Map<String, Value>> {
        self.records()
            .into_iter()
            .filter(|record| record.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Number of records so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionEventSink for MemoryEventSink {
    fn record(&self, event: &SessionEvent) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.to_record());
    }
}
