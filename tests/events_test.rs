// ABOUTME: Integration tests for session event records and the in-memory sink
// ABOUTME: Checks flattened keys, warning classification and sink filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use rehab_sync_engine::events::{
    MemoryEventSink, SessionEvent, SessionEventSink, TracingEventSink,
};
use rehab_sync_engine::intelligence::{FatigueLevel, PainLevel};
use rehab_sync_engine::models::JointType;
use serde_json::Value;
use uuid::Uuid;

fn rep_completed(session_id: Uuid, rep_number: u32) -> SessionEvent {
    SessionEvent::RepCompleted {
        session_id,
        rep_number,
        total_score: 87.5,
        timestamp_ms: 4_200,
    }
}

#[test]
fn test_record_flattens_fields() {
    common::init_test_logging();
    let session_id = Uuid::new_v4();
    let record = rep_completed(session_id, 3).to_record();

    assert_eq!(record.get("event").and_then(Value::as_str), Some("rep_completed"));
    assert_eq!(record.get("timestamp_ms").and_then(Value::as_u64), Some(4_200));
    assert_eq!(record.get("rep_number").and_then(Value::as_u64), Some(3));
    assert_eq!(
        record.get("session_id").and_then(Value::as_str),
        Some(session_id.to_string().as_str())
    );
}

#[test]
fn test_names_and_accessors() {
    let session_id = Uuid::new_v4();
    let calibration = SessionEvent::CalibrationCompleted {
        session_id,
        joint: JointType::LeftShoulder,
        max_angle: 120.0,
        confidence: 0.9,
        timestamp_ms: 10,
    };
    assert_eq!(calibration.name(), "calibration_completed");
    assert_eq!(calibration.session_id(), session_id);
    assert_eq!(calibration.timestamp_ms(), 10);
    assert!(!calibration.is_warning());

    let pain = SessionEvent::PainWarning {
        session_id,
        level: PainLevel::Severe,
        timestamp_ms: 20,
    };
    assert!(pain.is_warning());
    assert_eq!(
        pain.to_record().get("level").and_then(Value::as_str),
        Some("SEVERE")
    );

    let fatigue = SessionEvent::FatigueWarning {
        session_id,
        level: FatigueLevel::Heavy,
        timestamp_ms: 30,
    };
    assert!(fatigue.is_warning());
    assert_eq!(fatigue.name(), "fatigue_warning");
}

#[test]
fn test_memory_sink_filters_by_name() {
    let sink = MemoryEventSink::new();
    assert!(sink.is_empty());

    let session_id = Uuid::new_v4();
    sink.record(&SessionEvent::SessionStarted {
        session_id,
        user_id: "patient-1".to_owned(),
        exercise_name: "Arm Raise".to_owned(),
        timestamp_ms: 0,
    });
    sink.record(&rep_completed(session_id, 1));
    sink.record(&rep_completed(session_id, 2));

    assert_eq!(sink.len(), 3);
    assert_eq!(sink.records_named("rep_completed").len(), 2);
    assert_eq!(sink.records_named("session_started").len(), 1);
    assert!(sink.records_named("session_ended").is_empty());
}

#[test]
fn test_tracing_sink_accepts_every_event() {
    common::init_test_logging();
    let sink = TracingEventSink;
    let session_id = Uuid::new_v4();
    sink.record(&rep_completed(session_id, 1));
    sink.record(&SessionEvent::SessionEnded {
        session_id,
        total_reps: 1,
        average_score: 80.0,
        timestamp_ms: 5_000,
    });
}
