// ABOUTME: Integration tests for calibration profile persistence
// ABOUTME: Covers the in-memory store and the JSON directory store in a temp dir
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chrono::Utc;
use rehab_sync_engine::errors::ErrorCode;
use rehab_sync_engine::models::{CalibrationState, JointCalibration, JointType, UserProfile};
use rehab_sync_engine::profile_store::{InMemoryProfileStore, JsonFileProfileStore, ProfileStore};
use tempfile::TempDir;

fn calibrated_profile(user_id: &str, max_angle: f64) -> UserProfile {
    let mut profile = UserProfile::new(user_id, "Test Patient");
    profile
        .apply_calibration(JointCalibration {
            joint: JointType::LeftShoulder,
            max_angle,
            min_angle: 5.0,
            confidence: 0.92,
            num_samples: 150,
            outliers_removed: 3,
            state: CalibrationState::Completed,
            calibrated_at: Utc::now(),
        })
        .unwrap();
    profile
}

#[test]
fn test_json_store_round_trip() -> Result<()> {
    common::init_test_logging();
    let dir = TempDir::new()?;
    let store = JsonFileProfileStore::open(dir.path().join("profiles"))?;
    assert!(store.directory().exists());

    assert!(store.load("patient-7")?.is_none());
    store.save(&calibrated_profile("patient-7", 118.0))?;
    assert!(store.directory().join("patient-7.json").exists());

    let loaded = store.load("patient-7")?.unwrap();
    assert_eq!(loaded.max_angle(JointType::LeftShoulder), Some(118.0));
    assert!(loaded.is_calibrated(JointType::LeftShoulder));
    assert!(!loaded.is_calibrated(JointType::RightShoulder));

    // Recalibration replaces the stored value
    store.save(&calibrated_profile("patient-7", 125.0))?;
    let reloaded = store.load("patient-7")?.unwrap();
    assert_eq!(reloaded.max_angle(JointType::LeftShoulder), Some(125.0));

    assert!(store.delete("patient-7")?);
    assert!(!store.delete("patient-7")?);
    assert!(store.load("patient-7")?.is_none());
    Ok(())
}

#[test]
fn test_json_store_rejects_path_like_ids() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonFileProfileStore::open(dir.path())?;

    for bad in ["", "../escape", "a/b", "name with spaces"] {
        let err = store.load(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput, "id {bad:?}");
    }
    Ok(())
}

#[test]
fn test_load_or_new_starts_uncalibrated() -> Result<()> {
    let store = InMemoryProfileStore::new();
    let fresh = store.load_or_new("patient-9", "New Patient")?;
    assert_eq!(fresh.user_id, "patient-9");
    assert!(fresh.joint_limits.is_empty());
    assert!(store.is_empty());

    store.save(&calibrated_profile("patient-9", 100.0))?;
    let existing = store.load_or_new("patient-9", "ignored")?;
    assert_eq!(existing.max_angle(JointType::LeftShoulder), Some(100.0));
    Ok(())
}

#[test]
fn test_in_memory_store_delete() -> Result<()> {
    let store = InMemoryProfileStore::new();
    store.save(&calibrated_profile("a", 90.0))?;
    store.save(&calibrated_profile("b", 95.0))?;
    assert_eq!(store.len(), 2);

    assert!(store.delete("a")?);
    assert!(!store.delete("a")?);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn test_incomplete_calibration_is_not_stored() {
    let mut profile = UserProfile::new("patient-3", "Patient");
    let err = profile
        .apply_calibration(JointCalibration {
            joint: JointType::RightShoulder,
            max_angle: 140.0,
            min_angle: 0.0,
            confidence: 0.0,
            num_samples: 4,
            outliers_removed: 0,
            state: CalibrationState::Error,
            calibrated_at: Utc::now(),
        })
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CalibrationNotReady);
    assert!(!profile.is_calibrated(JointType::RightShoulder));
}
