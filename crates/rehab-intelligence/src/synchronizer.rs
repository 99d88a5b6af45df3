// ABOUTME: Wait-for-user synchronization state machine pacing the reference video to the user
// ABOUTME: Advances motion phases at checkpoints with hysteresis, loop/skip timeouts and rep counting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Synchronization Controller
//!
//! One controller per session. Each [`SyncController::update`] compares the
//! live angle with the personalized target and decides whether the reference
//! playback may continue:
//!
//! - before the next checkpoint the reference plays freely
//! - at a checkpoint playback pauses until the user satisfies the checkpoint
//!   on `confirm_frames` consecutive updates
//! - after `loop_after_ms` of waiting the segment loops, after `max_wait_ms`
//!   the checkpoint is skipped so the session cannot deadlock
//!
//! The controller is deterministic: the only clock is the timestamp passed in.

use crate::config::{RescalingConfig, SyncConfig};
use crate::models::{ExerciseDefinition, MotionPhase};
use crate::rescaling::{TargetComparison, TargetRescaler, TargetTrajectory};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Playback directive for the reference video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Keep playing
    Play,
    /// Hold the current reference frame
    Pause,
    /// Replay the current segment while waiting
    Loop,
    /// The checkpoint was skipped; jump past it
    Skip,
    /// Every checkpoint has been passed
    Complete,
}

impl SyncStatus {
    /// Whether the reference cursor must stay where it is
    #[must_use]
    pub const fn holds_reference(self) -> bool {
        matches!(self, Self::Pause | Self::Loop)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Loop => "LOOP",
            Self::Skip => "SKIP",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// Controller output after each update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Current motion phase
    pub phase: MotionPhase,
    /// Playback directive
    pub status: SyncStatus,
    /// Completed repetitions
    pub rep_count: u32,
    /// Personalized target at the reference position (degrees)
    pub target_angle: f64,
    /// Instruction for the user
    pub message: String,
    /// Reference frame of the last update
    pub reference_frame: u32,
    /// Index of the next checkpoint to pass
    pub checkpoint_index: usize,
    /// Time spent waiting at the current checkpoint (ms)
    pub wait_ms: u64,
    /// Live angle versus target, when an angle was available
    pub comparison: Option<TargetComparison>,
}

impl SyncState {
    fn initial() -> Self {
        Self {
            phase: MotionPhase::Idle,
            status: SyncStatus::Pause,
            rep_count: 0,
            target_angle: 0.0,
            message: "Get ready".to_owned(),
            reference_frame: 0,
            checkpoint_index: 0,
            wait_ms: 0,
            comparison: None,
        }
    }
}

/// Wait-for-user state machine
#[derive(Debug, Clone)]
pub struct SyncController {
    exercise: ExerciseDefinition,
    trajectory: TargetTrajectory,
    sync: SyncConfig,
    rescaling: RescalingConfig,
    checkpoint_targets: Vec<f64>,
    state: SyncState,
    waiting_since_ms: Option<u64>,
    confirmations: u32,
    skipped_checkpoints: Vec<usize>,
}

impl SyncController {
    /// Create a controller for one session
    #[must_use]
    pub fn new(
        exercise: ExerciseDefinition,
        trajectory: TargetTrajectory,
        sync: SyncConfig,
        rescaling: RescalingConfig,
    ) -> Self {
        let checkpoint_targets = exercise
            .checkpoints()
            .iter()
            .map(|c| trajectory.target_at(exercise.frame_to_ms(c.frame_index)))
            .collect();
        Self {
            exercise,
            trajectory,
            sync,
            rescaling,
            checkpoint_targets,
            state: SyncState::initial(),
            waiting_since_ms: None,
            confirmations: 0,
            skipped_checkpoints: Vec::new(),
        }
    }

    /// Process one frame.
    ///
    /// `user_angle` is `None` when the detector found nobody; the FSM then
    /// keeps its state. Once COMPLETE, the state is returned unchanged.
    pub fn update(
        &mut self,
        user_angle: Option<f64>,
        reference_frame: u32,
        timestamp_ms: u64,
    ) -> SyncState {
        if self.state.status == SyncStatus::Complete {
            return self.state.clone();
        }

        let target = self
            .trajectory
            .target_at(self.exercise.frame_to_ms(reference_frame));
        self.state.reference_frame = reference_frame;
        self.state.target_angle = target;
        self.state.comparison = user_angle.map(|angle| self.classify(angle, target));

        let index = self.state.checkpoint_index;
        let Some(checkpoint_frame) = self
            .exercise
            .checkpoints()
            .get(index)
            .map(|c| c.frame_index)
        else {
            self.complete();
            return self.state.clone();
        };

        if reference_frame < checkpoint_frame {
            self.waiting_since_ms = None;
            self.confirmations = 0;
            self.state.wait_ms = 0;
            self.state.status = SyncStatus::Play;
            return self.state.clone();
        }

        let since = *self.waiting_since_ms.get_or_insert(timestamp_ms);
        self.state.wait_ms = timestamp_ms.saturating_sub(since);

        let Some(angle) = user_angle else {
            self.state.status = SyncStatus::Pause;
            return self.state.clone();
        };

        let checkpoint_target = self.checkpoint_targets[index];
        let waiting = self.classify(angle, checkpoint_target);
        if self.is_satisfied(index, angle, &waiting) {
            self.confirmations += 1;
        } else {
            self.confirmations = 0;
        }

        if self.confirmations >= self.sync.confirm_frames {
            self.advance(false);
        } else if self.state.wait_ms > self.sync.max_wait_ms {
            warn!(
                checkpoint = index,
                wait_ms = self.state.wait_ms,
                user_angle = angle,
                target = checkpoint_target,
                "Skipping checkpoint after waiting too long"
            );
            self.skipped_checkpoints.push(index);
            self.advance(true);
        } else {
            self.state.status = if self.state.wait_ms > self.sync.loop_after_ms {
                SyncStatus::Loop
            } else {
                SyncStatus::Pause
            };
            waiting.message().clone_into(&mut self.state.message);
        }

        self.state.clone()
    }

    /// Exclude `paused_ms` of engine pause from the checkpoint wait timer
    pub fn discount_pause(&mut self, paused_ms: u64) {
        if let Some(since) = self.waiting_since_ms.as_mut() {
            *since = since.saturating_add(paused_ms);
        }
    }

    /// Return to IDLE / PAUSE with zero reps, discarding in-flight history
    pub fn reset(&mut self) {
        self.state = SyncState::initial();
        self.waiting_since_ms = None;
        self.confirmations = 0;
        self.skipped_checkpoints.clear();
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    /// Whether every checkpoint has been passed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.status == SyncStatus::Complete
    }

    /// Checkpoints passed by timeout rather than by the user
    #[must_use]
    pub fn skipped_checkpoints(&self) -> &[usize] {
        &self.skipped_checkpoints
    }

    /// Exercise being synchronized
    #[must_use]
    pub const fn exercise(&self) -> &ExerciseDefinition {
        &self.exercise
    }

    /// Personalized target trajectory
    #[must_use]
    pub const fn trajectory(&self) -> &TargetTrajectory {
        &self.trajectory
    }

    fn classify(&self, angle: f64, target: f64) -> TargetComparison {
        TargetRescaler::compare_with_ratio(
            angle,
            target,
            self.rescaling.tolerance_deg,
            self.rescaling.perfect_ratio,
        )
    }

    /// On target, or already past the target in the direction of motion
    fn is_satisfied(&self, index: usize, angle: f64, comparison: &TargetComparison) -> bool {
        if comparison.classification.is_on_target() {
            return true;
        }
        let target = self.checkpoint_targets[index];
        let previous = index
            .checked_sub(1)
            .map_or_else(|| self.trajectory.target_at(0.0), |i| self.checkpoint_targets[i]);
        let tolerance = self.rescaling.tolerance_deg;
        if target >= previous {
            angle >= target - tolerance
        } else {
            angle <= target + tolerance
        }
    }

    fn advance(&mut self, skipped: bool) {
        let index = self.state.checkpoint_index;
        let Some(checkpoint) = self.exercise.checkpoints().get(index) else {
            self.complete();
            return;
        };

        let previous = self.state.phase;
        self.state.phase = checkpoint.phase;
        checkpoint.message.clone_into(&mut self.state.message);
        if previous == MotionPhase::Concentric && checkpoint.phase == MotionPhase::Idle {
            self.state.rep_count += 1;
            info!(rep_count = self.state.rep_count, "Repetition completed");
        }
        debug!(
            checkpoint = index,
            from = %previous,
            to = %checkpoint.phase,
            skipped,
            "Checkpoint passed"
        );

        self.state.checkpoint_index += 1;
        self.waiting_since_ms = None;
        self.confirmations = 0;
        self.state.wait_ms = 0;

        if self.state.checkpoint_index >= self.exercise.checkpoints().len() {
            self.complete();
        } else {
            self.state.status = if skipped {
                SyncStatus::Skip
            } else {
                SyncStatus::Play
            };
        }
    }

    fn complete(&mut self) {
        if self.state.status != SyncStatus::Complete {
            info!(rep_count = self.state.rep_count, "Exercise complete");
        }
        self.state.status = SyncStatus::Complete;
        "Exercise complete".clone_into(&mut self.state.message);
    }
}
