// ABOUTME: Integration tests for the wait-for-user synchronization state machine
// ABOUTME: Drives full repetitions, loop and skip timeouts, missing detections and resets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{arm_raise_user_angle, single_arm_raise};
use rehab_sync_engine::config::{RescalingConfig, SyncConfig};
use rehab_sync_engine::intelligence::{SyncController, SyncState, SyncStatus, TargetRescaler};
use rehab_sync_engine::models::MotionPhase;

fn controller(user_max: f64) -> SyncController {
    let exercise = single_arm_raise();
    let trajectory = TargetRescaler::generate_target_trajectory(
        exercise.reference_angles(),
        user_max,
        exercise.duration_ms(),
        exercise.fps(),
        0.05,
    )
    .unwrap();
    SyncController::new(
        exercise,
        trajectory,
        SyncConfig::default(),
        RescalingConfig::default(),
    )
}

/// Move the reference cursor the way a player would for `state`
fn advance_cursor(controller: &SyncController, state: &SyncState, cursor: u32) -> u32 {
    let last = controller.exercise().total_frames() - 1;
    match state.status {
        SyncStatus::Skip => {
            let skipped = controller.exercise().checkpoints()[state.checkpoint_index - 1].frame_index;
            (skipped + 1).min(last)
        }
        status if status.holds_reference() => cursor,
        _ => (cursor + 1).min(last),
    }
}

#[test]
fn test_full_repetition_is_counted() {
    common::init_test_logging();
    let mut sync = controller(150.0);
    let mut cursor = 0;
    let mut phases = Vec::new();

    for frame in 0..190_usize {
        let state = sync.update(Some(arm_raise_user_angle(frame)), cursor, frame as u64 * 33);
        if phases.last() != Some(&state.phase) {
            phases.push(state.phase);
        }
        if state.status == SyncStatus::Complete {
            break;
        }
        cursor = advance_cursor(&sync, &state, cursor);
    }

    let state = sync.state();
    assert_eq!(state.status, SyncStatus::Complete);
    assert_eq!(state.rep_count, 1);
    assert_eq!(state.phase, MotionPhase::Idle);
    assert!(sync.skipped_checkpoints().is_empty());
    assert_eq!(
        phases,
        vec![
            MotionPhase::Idle,
            MotionPhase::Eccentric,
            MotionPhase::Hold,
            MotionPhase::Concentric,
            MotionPhase::Idle
        ]
    );
}

#[test]
fn test_reference_pauses_at_unmet_checkpoint() {
    let mut sync = controller(150.0);
    let mut cursor = 0;
    let mut state = sync.update(Some(0.0), cursor, 0);
    for frame in 1..60_u64 {
        cursor = advance_cursor(&sync, &state, cursor);
        state = sync.update(Some(0.0), cursor, frame * 33);
    }
    // The hold checkpoint at frame 40 needs the arm raised
    assert_eq!(state.status, SyncStatus::Pause);
    assert_eq!(state.reference_frame, 40);
    assert_eq!(state.phase, MotionPhase::Eccentric);
    assert!(state.comparison.is_some());
}

#[test]
fn test_loop_then_skip_on_timeout() {
    let mut sync = controller(150.0);
    let mut cursor = 0;
    let mut first_loop = None;
    let mut first_skip = None;

    for step in 0..400_u64 {
        let state = sync.update(Some(0.0), cursor, step * 100);
        if state.status == SyncStatus::Loop && first_loop.is_none() {
            first_loop = Some(state.wait_ms);
        }
        if state.status == SyncStatus::Skip && first_skip.is_none() {
            first_skip = Some(step);
        }
        if state.status == SyncStatus::Complete {
            break;
        }
        cursor = advance_cursor(&sync, &state, cursor);
    }

    assert!(first_loop.unwrap() > 3_000);
    assert_eq!(first_skip, Some(122));
    assert_eq!(sync.skipped_checkpoints(), &[1, 2]);
    // The final IDLE checkpoint is met at rest, closing the skipped repetition
    assert!(sync.is_complete());
    assert_eq!(sync.state().rep_count, 1);
}

#[test]
fn test_pause_time_does_not_count_toward_skip() {
    let mut sync = controller(150.0);
    let mut cursor = 0;
    let mut state = sync.update(Some(0.0), cursor, 0);
    for frame in 1..60_u64 {
        cursor = advance_cursor(&sync, &state, cursor);
        state = sync.update(Some(0.0), cursor, frame * 33);
    }
    assert_eq!(state.status, SyncStatus::Pause);
    let waited = state.wait_ms;

    // A minute away from the session, then the next frame arrives
    let paused_ms = 60_000;
    sync.discount_pause(paused_ms);
    let resumed = sync.update(Some(0.0), cursor, 60 * 33 + paused_ms);
    assert_eq!(resumed.status, SyncStatus::Pause);
    assert_eq!(resumed.wait_ms, waited + 33);
    assert!(sync.skipped_checkpoints().is_empty());
}

#[test]
fn test_discount_without_wait_is_noop() {
    let mut sync = controller(150.0);
    sync.discount_pause(10_000);
    let state = sync.update(Some(0.0), 0, 0);
    assert_eq!(state.wait_ms, 0);
    assert_eq!(state.status, SyncStatus::Play);
}

#[test]
fn test_missing_detection_keeps_state() {
    let mut sync = controller(150.0);
    let mut cursor = 0;
    let mut state = sync.update(None, cursor, 0);
    for frame in 1..30_u64 {
        cursor = advance_cursor(&sync, &state, cursor);
        state = sync.update(None, cursor, frame * 33);
    }
    assert_eq!(state.status, SyncStatus::Pause);
    assert_eq!(state.phase, MotionPhase::Idle);
    assert_eq!(state.rep_count, 0);
    assert_eq!(state.checkpoint_index, 0);
    assert!(state.comparison.is_none());
}

#[test]
fn test_complete_is_terminal() {
    let mut sync = controller(150.0);
    let mut cursor = 0;
    for frame in 0..190_usize {
        let state = sync.update(Some(arm_raise_user_angle(frame)), cursor, frame as u64 * 33);
        if state.status == SyncStatus::Complete {
            break;
        }
        cursor = advance_cursor(&sync, &state, cursor);
    }
    let done = sync.state().clone();
    let again = sync.update(Some(20.0), 5, 99_999);
    assert_eq!(again, done);
}

#[test]
fn test_reset_clears_progress() {
    let mut sync = controller(150.0);
    for step in 0..130_u64 {
        sync.update(Some(0.0), 40, step * 100);
    }
    assert!(!sync.skipped_checkpoints().is_empty() || sync.state().checkpoint_index > 0);

    sync.reset();
    let state = sync.state();
    assert_eq!(state.phase, MotionPhase::Idle);
    assert_eq!(state.status, SyncStatus::Pause);
    assert_eq!(state.rep_count, 0);
    assert_eq!(state.checkpoint_index, 0);
    assert!(sync.skipped_checkpoints().is_empty());
}

#[test]
fn test_personalized_target_is_lower() {
    let mut sync = controller(90.0);
    let peak = sync.trajectory().peak();
    assert!((peak - 94.5).abs() < 1e-9);

    let state = sync.update(Some(90.0), 50, 0);
    assert!((state.target_angle - 94.5).abs() < 1e-9);
}
