// ABOUTME: Integration tests for the caller-owned session store
// ABOUTME: Covers routing frames by id, unknown sessions, finalization and background pain workers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use common::{detected, fast_config, single_arm_raise};
use rehab_sync_engine::config::EngineConfig;
use rehab_sync_engine::errors::ErrorCode;
use rehab_sync_engine::events::{MemoryEventSink, SessionEventSink};
use rehab_sync_engine::models::{JointType, UserProfile};
use rehab_sync_engine::profile_store::{InMemoryProfileStore, JsonFileProfileStore, ProfileStore};
use rehab_sync_engine::session_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

fn sink() -> Arc<dyn SessionEventSink> {
    Arc::new(MemoryEventSink::new())
}

#[tokio::test]
async fn test_sessions_are_independent() -> Result<()> {
    common::init_test_logging();
    let store = SessionStore::new();
    let first = store.create(
        UserProfile::new("user-a", "A"),
        single_arm_raise(),
        EngineConfig::default(),
        sink(),
    )?;
    let second = store.create(
        UserProfile::new("user-b", "B"),
        single_arm_raise(),
        EngineConfig::default(),
        sink(),
    )?;
    assert_ne!(first, second);
    assert_eq!(store.len(), 2);

    for step in 0..5_u64 {
        store.process_frame(first, &detected(step * 33, 90.0)).await?;
    }
    let output = store.process_frame(second, &detected(0, 90.0)).await?;
    assert_eq!(output.detection.unwrap().stable_frames, 1);

    let engine = store.get(first)?;
    assert_eq!(engine.lock().await.profile().user_id, "user-a");
    Ok(())
}

#[tokio::test]
async fn test_unknown_session() {
    let store = SessionStore::new();
    let missing = Uuid::new_v4();

    let err = store
        .process_frame(missing, &detected(0, 90.0))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
    assert_eq!(err.context.session_id, Some(missing));

    let err = store.end_session(missing).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
    assert!(!store.remove(missing));
}

#[tokio::test]
async fn test_end_session_removes_entry() -> Result<()> {
    let store = SessionStore::new();
    let id = store.create(
        UserProfile::new("user-c", "C"),
        single_arm_raise(),
        EngineConfig::default(),
        sink(),
    )?;
    store.process_frame(id, &detected(0, 90.0)).await?;

    let report = store.end_session(id).await?;
    assert_eq!(report.session_id, id);
    assert_eq!(report.total_reps, 0);
    assert!(store.is_empty());
    assert!(store.get(id).is_err());
    Ok(())
}

#[tokio::test]
async fn test_pain_worker_session() -> Result<()> {
    let store = SessionStore::new();
    let events = Arc::new(MemoryEventSink::new());
    let id = store.create_with_pain_worker(
        UserProfile::new("user-d", "D"),
        single_arm_raise(),
        EngineConfig::default(),
        events.clone(),
    )?;

    for step in 0..10_u64 {
        let input = detected(step * 100, 90.0).with_pain_score(85.0);
        let output = store.process_frame(id, &input).await?;
        assert!(output.detection.is_some());
        // Give the worker a chance to drain the queue between frames
        sleep(Duration::from_millis(2)).await;
    }

    for _ in 0..50 {
        if !events.records_named("pain_warning").is_empty() {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(events.records_named("pain_warning").len(), 1);

    let report = store.end_session(id).await?;
    assert_eq!(report.total_reps, 0);
    Ok(())
}

/// Drive a session through detection and calibration at `angle`
async fn calibrate(store: &SessionStore, id: Uuid, angle: f64) -> Result<()> {
    for step in 0..500_u64 {
        let output = store.process_frame(id, &detected(step * 33, angle)).await?;
        if output.phase == 3 {
            return Ok(());
        }
    }
    panic!("session {id} never reached sync");
}

#[tokio::test]
async fn test_calibration_carries_over_to_next_session() -> Result<()> {
    let profiles = Arc::new(InMemoryProfileStore::new());
    let store = SessionStore::with_profile_store(profiles.clone());
    let first = store.create(
        UserProfile::new("user-e", "E"),
        single_arm_raise(),
        fast_config(),
        sink(),
    )?;
    calibrate(&store, first, 100.0).await?;

    // Saved as soon as the joints completed, before the session ends
    let saved = profiles.load("user-e")?.unwrap();
    assert!(saved.is_calibrated(JointType::LeftShoulder));
    assert!(saved.is_calibrated(JointType::RightShoulder));

    store.end_session(first).await?;
    let second = store.create(
        UserProfile::new("user-e", "E"),
        single_arm_raise(),
        fast_config(),
        sink(),
    )?;
    let engine = store.get(second)?;
    let engine = engine.lock().await;
    let max = engine.profile().max_angle(JointType::LeftShoulder).unwrap();
    assert!((max - 100.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_new_user_starts_from_given_profile() -> Result<()> {
    let profiles = Arc::new(InMemoryProfileStore::new());
    let store = SessionStore::with_profile_store(profiles.clone());
    let id = store.create(
        UserProfile::new("user-f", "F").with_age(67),
        single_arm_raise(),
        EngineConfig::default(),
        sink(),
    )?;
    assert!(profiles.is_empty());

    store.end_session(id).await?;
    let saved = profiles.load("user-f")?.unwrap();
    assert_eq!(saved.age, Some(67));
    assert!(saved.joint_limits.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_json_profiles_survive_store_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let store = SessionStore::with_profile_store(Arc::new(JsonFileProfileStore::open(dir.path())?));
        let id = store.create(
            UserProfile::new("user-g", "G"),
            single_arm_raise(),
            fast_config(),
            sink(),
        )?;
        calibrate(&store, id, 90.0).await?;
        store.end_session(id).await?;
    }

    let store = SessionStore::with_profile_store(Arc::new(JsonFileProfileStore::open(dir.path())?));
    let id = store.create(
        UserProfile::new("user-g", "G"),
        single_arm_raise(),
        fast_config(),
        sink(),
    )?;
    let engine = store.get(id)?;
    let max = engine
        .lock()
        .await
        .profile()
        .max_angle(JointType::LeftShoulder)
        .unwrap();
    assert!((max - 90.0).abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_creates_no_session() {
    let store = SessionStore::new();
    let mut config = EngineConfig::default();
    config.sync.confirm_frames = 0;
    let err = store
        .create(UserProfile::new("user-h", "H"), single_arm_raise(), config, sink())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
    assert!(store.is_empty());
}
