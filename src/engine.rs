// ABOUTME: Per-session motion engine driving detection, calibration, synchronization and reporting
// ABOUTME: Produces the phase-tagged per-frame output record from landmark frames
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Motion Engine
//!
//! One [`MotionEngine`] per session. Every call to
//! [`MotionEngine::process_frame`] runs synchronously on the caller's thread
//! and returns exactly one phase-specific record:
//!
//! 1. `detection`: wait for a stable pose, then count down
//! 2. `calibration`: safe-max calibration of the exercise's primary joints
//! 3. `sync`: wait-for-user synchronization with live and per-rep scoring
//! 4. `final_report`: the cached session report

use crate::errors::{AppError, AppResult};
use crate::events::{SessionEvent, SessionEventSink};
use crate::intelligence::config::EngineConfig;
use crate::intelligence::constants::scoring::REALTIME_EMA_RETAIN;
use crate::intelligence::{
    CalibrationEngine, CalibrationOutcome, DtwAnalyzer, FatigueLevel, HealthScorer,
    KinematicsEngine, PainLevel, PainMonitor, RepScore, ScorerStatus, SessionReport,
    SyncController, SyncState, SyncStatus, TargetRescaler, TargetTrajectory,
};
use crate::models::{
    CalibrationState, ExerciseDefinition, JointTable, JointType, LandmarkFrame, PoseDetection,
    UserProfile,
};
use crate::pain_worker::{PainSample, PainWorkerHandle};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Top-level session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for a stable pose
    Detection,
    /// Calibrating joints
    Calibration,
    /// Synchronized exercise
    Sync,
    /// Session finished
    FinalReport,
}

impl SessionPhase {
    /// Wire number (1-4)
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Detection => 1,
            Self::Calibration => 2,
            Self::Sync => 3,
            Self::FinalReport => 4,
        }
    }

    /// Wire name, identical to the populated field of [`FrameOutput`]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Calibration => "calibration",
            Self::Sync => "sync",
            Self::FinalReport => "final_report",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame from the pose source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture time (ms), non-decreasing within a session
    pub timestamp_ms: u64,
    /// Detector result
    pub detection: PoseDetection,
    /// Facial pain score (0-100) from the secondary channel
    pub pain_score: Option<f64>,
}

impl FrameInput {
    /// Frame without a pain score
    #[must_use]
    pub const fn new(timestamp_ms: u64, detection: PoseDetection) -> Self {
        Self {
            timestamp_ms,
            detection,
            pain_score: None,
        }
    }

    /// Attach a facial pain score
    #[must_use]
    pub const fn with_pain_score(mut self, score: f64) -> Self {
        self.pain_score = Some(score);
        self
    }
}

/// Phase 1 payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionOutput {
    /// Whether this frame had a pose
    pub detected: bool,
    /// Consecutive frames with a pose
    pub stable_frames: u32,
    /// Consecutive frames needed
    pub required_frames: u32,
    /// Countdown left once the pose is stable (ms)
    pub countdown_remaining_ms: Option<u64>,
    /// Calibration starts with the next frame
    pub ready: bool,
    /// Instruction for the user
    pub message: String,
}

/// Stage within one joint's calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStage {
    /// Countdown before the window opens
    Countdown,
    /// Window open, collecting angles
    Collecting,
    /// Every queued joint is done
    Done,
}

/// Phase 2 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutput {
    /// Joint being calibrated
    pub joint: Option<JointType>,
    /// Position in the calibration queue
    pub joint_index: usize,
    /// Length of the calibration queue
    pub total_joints: usize,
    /// Stage of the current joint
    pub stage: CalibrationStage,
    /// Countdown left before collecting (ms)
    pub countdown_remaining_ms: u64,
    /// Window progress (0-1)
    pub progress: f64,
    /// Angle measured from this frame
    pub current_angle: Option<f64>,
    /// Result, on the frame that closed a window
    pub outcome: Option<CalibrationOutcome>,
    /// Instruction for the user
    pub message: String,
}

/// Live deviation of one tracked joint from its personalized target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointError {
    /// Joint measured
    pub joint: JointType,
    /// Measured angle (degrees)
    pub user_angle: f64,
    /// Personalized target at the current reference frame (degrees)
    pub target_angle: f64,
    /// Absolute difference (degrees)
    pub error: f64,
    /// Error relative to the target; 0 when the target is at rest
    pub error_percent: f64,
    /// Frame score (0-100); `None` while the target is at rest
    pub score: Option<f64>,
    /// Weight of this joint for the exercise
    pub weight: f64,
}

/// Phase 3 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutput {
    /// Controller state after this frame
    pub state: SyncState,
    /// Primary joint angle, when measurable
    pub user_angle: Option<f64>,
    /// Smoothed live score (0-100)
    pub realtime_score: f64,
    /// Weighted multi-joint score of this frame, before smoothing
    pub multi_joint_score: Option<f64>,
    /// Mean of every multi-joint frame score so far
    pub average_score: f64,
    /// Per-joint deviation for each tracked joint measured on this frame
    pub joint_errors: Vec<JointError>,
    /// Repetition scored on this frame
    pub completed_rep: Option<RepScore>,
    /// Scorer snapshot
    pub scorer: ScorerStatus,
    /// Pain level of this frame's score
    pub pain_level: Option<PainLevel>,
    /// Whether a sustained pain episode is ongoing
    pub pain_alert: bool,
}

/// Phase-tagged per-frame record; exactly one payload is populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    /// Phase number (1-4)
    pub phase: u8,
    /// Phase name
    pub phase_name: String,
    /// Engine is paused and this frame was not consumed
    #[serde(default)]
    pub paused: bool,
    /// Phase 1 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionOutput>,
    /// Phase 2 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationOutput>,
    /// Phase 3 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<Box<SyncOutput>>,
    /// Phase 4 payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<Box<SessionReport>>,
}

impl FrameOutput {
    fn empty(phase: SessionPhase) -> Self {
        Self {
            phase: phase.number(),
            phase_name: phase.name().to_owned(),
            paused: false,
            detection: None,
            calibration: None,
            sync: None,
            final_report: None,
        }
    }

    fn detection(payload: DetectionOutput) -> Self {
        Self {
            detection: Some(payload),
            ..Self::empty(SessionPhase::Detection)
        }
    }

    fn calibration(payload: CalibrationOutput) -> Self {
        Self {
            calibration: Some(payload),
            ..Self::empty(SessionPhase::Calibration)
        }
    }

    fn sync(payload: SyncOutput) -> Self {
        Self {
            sync: Some(Box::new(payload)),
            ..Self::empty(SessionPhase::Sync)
        }
    }

    fn final_report(report: SessionReport) -> Self {
        Self {
            final_report: Some(Box::new(report)),
            ..Self::empty(SessionPhase::FinalReport)
        }
    }
}

#[derive(Debug, Default)]
struct DetectionTracker {
    stable_frames: u32,
    countdown_started_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct CalibrationQueue {
    joints: Vec<JointType>,
    index: usize,
    countdown_started_ms: Option<u64>,
}

/// Personalized target trajectory of one tracked joint
#[derive(Debug)]
struct JointTarget {
    joint: JointType,
    weight: f64,
    trajectory: TargetTrajectory,
}

/// Pain handling: a background worker when one is attached, inline otherwise
enum PainChannel {
    Inline(PainMonitor),
    Worker(PainWorkerHandle),
}

/// Per-session engine
pub struct MotionEngine {
    session_id: Uuid,
    profile: UserProfile,
    exercise: ExerciseDefinition,
    config: EngineConfig,
    sink: Arc<dyn SessionEventSink>,
    kinematics: KinematicsEngine,
    calibration: CalibrationEngine,
    dtw: DtwAnalyzer,
    scorer: HealthScorer,
    pain: PainChannel,
    phase: SessionPhase,
    started: bool,
    paused: bool,
    paused_at_ms: Option<u64>,
    detection: DetectionTracker,
    queue: CalibrationQueue,
    sync: Option<SyncController>,
    joint_targets: Vec<JointTarget>,
    cursor: u32,
    user_window: Vec<f64>,
    reference_window: Vec<f64>,
    realtime_score: f64,
    score_total: f64,
    scored_frames: u32,
    last_timestamp_ms: u64,
    last_output: Option<FrameOutput>,
    report: Option<SessionReport>,
}

impl MotionEngine {
    /// Create an engine in the detection phase
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` when `config` fails validation
    pub fn new(
        session_id: Uuid,
        profile: UserProfile,
        exercise: ExerciseDefinition,
        config: EngineConfig,
        sink: Arc<dyn SessionEventSink>,
    ) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::from(e).with_session_id(session_id))?;

        let kinematics = KinematicsEngine::new(JointTable::standard(), config.kinematics.clone());
        let calibration = CalibrationEngine::new(config.calibration.clone(), kinematics.clone());
        let mut scorer = HealthScorer::new(config.scoring.clone());
        scorer.start_session(exercise.name(), session_id);

        Ok(Self {
            session_id,
            profile,
            dtw: DtwAnalyzer::new(config.dtw.clone()),
            pain: PainChannel::Inline(PainMonitor::new(config.pain.clone())),
            exercise,
            config,
            sink,
            kinematics,
            calibration,
            scorer,
            phase: SessionPhase::Detection,
            started: false,
            paused: false,
            paused_at_ms: None,
            detection: DetectionTracker::default(),
            queue: CalibrationQueue::default(),
            sync: None,
            joint_targets: Vec::new(),
            cursor: 0,
            user_window: Vec::new(),
            reference_window: Vec::new(),
            realtime_score: 0.0,
            score_total: 0.0,
            scored_frames: 0,
            last_timestamp_ms: 0,
            last_output: None,
            report: None,
        })
    }

    /// Route pain scores through a background worker instead of observing inline
    #[must_use]
    pub fn with_pain_worker(mut self, worker: PainWorkerHandle) -> Self {
        self.pain = PainChannel::Worker(worker);
        self
    }

    /// Session identifier
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// User profile, including calibrations made in this session
    #[must_use]
    pub const fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Exercise being performed
    #[must_use]
    pub const fn exercise(&self) -> &ExerciseDefinition {
        &self.exercise
    }

    /// Synchronization controller, once phase 3 has been entered
    #[must_use]
    pub const fn sync_controller(&self) -> Option<&SyncController> {
        self.sync.as_ref()
    }

    /// Reference frame the next sync update will use
    #[must_use]
    pub const fn reference_cursor(&self) -> u32 {
        self.cursor
    }

    /// Whether frames are currently ignored
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Process one frame.
    ///
    /// # Errors
    ///
    /// Only session-fatal configuration errors are returned, such as a
    /// primary joint missing from the joint table or a reference trajectory
    /// without motion. Data-quality problems are absorbed.
    pub fn process_frame(&mut self, input: &FrameInput) -> AppResult<FrameOutput> {
        if !self.started {
            self.started = true;
            self.emit(SessionEvent::SessionStarted {
                session_id: self.session_id,
                user_id: self.profile.user_id.clone(),
                exercise_name: self.exercise.name().to_owned(),
                timestamp_ms: input.timestamp_ms,
            });
        }

        if self.paused {
            return Ok(self.paused_output());
        }
        if let Some(paused_at) = self.paused_at_ms.take() {
            let paused_ms = input.timestamp_ms.saturating_sub(paused_at);
            if let Some(sync) = self.sync.as_mut() {
                sync.discount_pause(paused_ms);
            }
        }
        self.last_timestamp_ms = input.timestamp_ms;

        let pain = if self.phase == SessionPhase::FinalReport {
            (None, false)
        } else {
            self.handle_pain(input)
        };

        let output = match self.phase {
            SessionPhase::Detection => self.process_detection(input),
            SessionPhase::Calibration => self.process_calibration(input)?,
            SessionPhase::Sync => self.process_sync(input, pain)?,
            SessionPhase::FinalReport => FrameOutput::final_report(self.finalize()),
        };
        self.last_output = Some(output.clone());
        Ok(output)
    }

    /// Stop consuming frames; the current phase output is returned unchanged.
    ///
    /// Time spent paused does not count toward checkpoint wait timeouts.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused_at_ms = Some(self.last_timestamp_ms);
        }
        self.paused = true;
        debug!(session.id = %self.session_id, phase = %self.phase, "Engine paused");
    }

    /// Resume consuming frames
    pub fn resume(&mut self) {
        self.paused = false;
        debug!(session.id = %self.session_id, phase = %self.phase, "Engine resumed");
    }

    /// Return to the detection phase with fresh scoring; calibrations already
    /// stored in the profile are kept
    pub fn restart(&mut self) {
        info!(session.id = %self.session_id, "Session restarted");
        self.phase = SessionPhase::Detection;
        self.paused = false;
        self.paused_at_ms = None;
        self.detection = DetectionTracker::default();
        self.queue = CalibrationQueue::default();
        self.calibration.reset();
        self.sync = None;
        self.joint_targets.clear();
        self.cursor = 0;
        self.user_window.clear();
        self.reference_window.clear();
        self.realtime_score = 0.0;
        self.score_total = 0.0;
        self.scored_frames = 0;
        self.last_output = None;
        self.report = None;
        self.scorer.start_session(self.exercise.name(), self.session_id);
        if let PainChannel::Inline(monitor) = &mut self.pain {
            *monitor = PainMonitor::new(self.config.pain.clone());
        }
    }

    /// Jump straight to synchronization using the stored profile
    ///
    /// # Errors
    ///
    /// Returns `ZERO_REFERENCE_AMPLITUDE` when the reference has no motion
    pub fn skip_calibration(&mut self) -> AppResult<()> {
        if matches!(self.phase, SessionPhase::Detection | SessionPhase::Calibration) {
            info!(session.id = %self.session_id, "Calibration skipped");
            self.calibration.reset();
            self.enter_sync()?;
        }
        Ok(())
    }

    /// Finish the session from any phase and return its report
    pub fn end_session(&mut self) -> SessionReport {
        let report = self.finalize();
        self.last_output = Some(FrameOutput::final_report(report.clone()));
        report
    }

    fn emit(&self, event: SessionEvent) {
        self.sink.record(&event);
    }

    fn paused_output(&self) -> FrameOutput {
        let mut output = self.last_output.clone().unwrap_or_else(|| {
            FrameOutput::detection(DetectionOutput {
                detected: false,
                stable_frames: self.detection.stable_frames,
                required_frames: self.config.detection.stable_frames_required,
                countdown_remaining_ms: None,
                ready: false,
                message: "Paused".to_owned(),
            })
        });
        output.paused = true;
        output
    }

    fn handle_pain(&mut self, input: &FrameInput) -> (Option<PainLevel>, bool) {
        let Some(score) = input.pain_score else {
            if let PainChannel::Worker(worker) = &self.pain {
                for event in worker.drain_events() {
                    self.scorer.add_pain_event(event);
                }
            }
            return (None, false);
        };

        match &mut self.pain {
            PainChannel::Inline(monitor) => {
                let observation = monitor.observe(score, input.timestamp_ms);
                if observation.alert_started {
                    self.sink.record(&SessionEvent::PainWarning {
                        session_id: self.session_id,
                        level: observation.level,
                        timestamp_ms: input.timestamp_ms,
                    });
                }
                if let Some(event) = observation.event {
                    self.scorer.add_pain_event(event);
                }
                (Some(observation.level), observation.alert)
            }
            PainChannel::Worker(worker) => {
                worker.submit(PainSample {
                    score,
                    timestamp_ms: input.timestamp_ms,
                });
                for event in worker.drain_events() {
                    self.scorer.add_pain_event(event);
                }
                (
                    Some(PainLevel::from_score(score, &self.config.pain)),
                    worker.is_alerting(),
                )
            }
        }
    }

    fn process_detection(&mut self, input: &FrameInput) -> FrameOutput {
        let detected = input.detection.is_detected();
        let required = self.config.detection.stable_frames_required;
        if detected {
            self.detection.stable_frames = self.detection.stable_frames.saturating_add(1);
        } else {
            self.detection = DetectionTracker::default();
        }

        let mut countdown_remaining_ms = None;
        let mut ready = false;
        if self.detection.stable_frames >= required {
            let started = *self
                .detection
                .countdown_started_ms
                .get_or_insert(input.timestamp_ms);
            let remaining = self
                .config
                .detection
                .countdown_ms
                .saturating_sub(input.timestamp_ms.saturating_sub(started));
            countdown_remaining_ms = Some(remaining);
            if remaining == 0 {
                ready = true;
                self.enter_calibration(input.timestamp_ms);
            }
        }

        let message = if !detected {
            "Step into the camera view"
        } else if ready {
            "Get ready to calibrate"
        } else if countdown_remaining_ms.is_some() {
            "Hold still, starting soon"
        } else {
            "Hold still"
        };

        FrameOutput::detection(DetectionOutput {
            detected,
            stable_frames: self.detection.stable_frames,
            required_frames: required,
            countdown_remaining_ms,
            ready,
            message: message.to_owned(),
        })
    }

    fn enter_calibration(&mut self, timestamp_ms: u64) {
        self.queue = CalibrationQueue {
            joints: self.exercise.calibration_joints(),
            index: 0,
            countdown_started_ms: Some(timestamp_ms),
        };
        self.phase = SessionPhase::Calibration;
        info!(
            session.id = %self.session_id,
            joints = ?self.queue.joints,
            "Calibration phase started"
        );
    }

    fn process_calibration(&mut self, input: &FrameInput) -> AppResult<FrameOutput> {
        let total_joints = self.queue.joints.len();
        let Some(&joint) = self.queue.joints.get(self.queue.index) else {
            self.enter_sync()?;
            return Ok(Self::calibration_done(total_joints, None));
        };

        if let Some(started) = self.queue.countdown_started_ms {
            let remaining = self
                .config
                .calibration
                .countdown_ms
                .saturating_sub(input.timestamp_ms.saturating_sub(started));
            if remaining > 0 {
                return Ok(FrameOutput::calibration(CalibrationOutput {
                    joint: Some(joint),
                    joint_index: self.queue.index,
                    total_joints,
                    stage: CalibrationStage::Countdown,
                    countdown_remaining_ms: remaining,
                    progress: 0.0,
                    current_angle: None,
                    outcome: None,
                    message: format!("Get ready to calibrate {joint}"),
                }));
            }
            self.queue.countdown_started_ms = None;
            self.calibration.start(joint, input.timestamp_ms);
        }

        let frame_outcome = self
            .calibration
            .add_frame(input.detection.frame(), input.timestamp_ms)?;

        let Some(outcome) = frame_outcome.outcome else {
            return Ok(FrameOutput::calibration(CalibrationOutput {
                joint: Some(joint),
                joint_index: self.queue.index,
                total_joints,
                stage: CalibrationStage::Collecting,
                countdown_remaining_ms: 0,
                progress: frame_outcome.progress,
                current_angle: frame_outcome.angle,
                outcome: None,
                message: "Move slowly to your comfortable maximum".to_owned(),
            }));
        };

        self.apply_outcome(&outcome, input.timestamp_ms)?;
        self.queue.index += 1;
        if self.queue.index < total_joints {
            self.queue.countdown_started_ms = Some(input.timestamp_ms);
            return Ok(FrameOutput::calibration(CalibrationOutput {
                joint: Some(joint),
                joint_index: self.queue.index - 1,
                total_joints,
                stage: CalibrationStage::Collecting,
                countdown_remaining_ms: 0,
                progress: 1.0,
                current_angle: frame_outcome.angle,
                outcome: Some(outcome),
                message: "Joint calibrated, next joint coming up".to_owned(),
            }));
        }

        self.enter_sync()?;
        Ok(Self::calibration_done(total_joints, Some(outcome)))
    }

    fn calibration_done(
        total_joints: usize,
        outcome: Option<CalibrationOutcome>,
    ) -> FrameOutput {
        FrameOutput::calibration(CalibrationOutput {
            joint: None,
            joint_index: total_joints,
            total_joints,
            stage: CalibrationStage::Done,
            countdown_remaining_ms: 0,
            progress: 1.0,
            current_angle: None,
            outcome,
            message: "Calibration complete, follow the video".to_owned(),
        })
    }

    fn apply_outcome(&mut self, outcome: &CalibrationOutcome, timestamp_ms: u64) -> AppResult<()> {
        match outcome {
            CalibrationOutcome::Completed(calibration) => {
                self.profile.apply_calibration(calibration.clone())?;
                self.emit(SessionEvent::CalibrationCompleted {
                    session_id: self.session_id,
                    joint: calibration.joint,
                    max_angle: calibration.max_angle,
                    confidence: calibration.confidence,
                    timestamp_ms,
                });
            }
            CalibrationOutcome::Failed { joint, reason } => {
                self.emit(SessionEvent::CalibrationFailed {
                    session_id: self.session_id,
                    joint: *joint,
                    reason: reason.clone(),
                    timestamp_ms,
                });
            }
        }
        Ok(())
    }

    fn enter_sync(&mut self) -> AppResult<()> {
        let primary = self.exercise.primary_joint();
        let reference_max = self.exercise.reference_max();
        let user_max = self
            .profile
            .calibration(primary)
            .filter(|c| c.state == CalibrationState::Completed)
            .map_or(reference_max, |c| c.max_angle);

        let trajectory = TargetRescaler::generate_target_trajectory(
            self.exercise.reference_angles(),
            user_max,
            self.exercise.duration_ms(),
            self.exercise.fps(),
            self.config.rescaling.challenge_factor,
        )
        .map_err(|e| e.with_session_id(self.session_id))?;

        info!(
            session.id = %self.session_id,
            joint = %primary,
            user_max,
            reference_max,
            scale_factor = trajectory.scale_factor(),
            "Synchronization phase started"
        );

        self.joint_targets = self.build_joint_targets(&trajectory)?;
        self.sync = Some(SyncController::new(
            self.exercise.clone(),
            trajectory,
            self.config.sync.clone(),
            self.config.rescaling.clone(),
        ));
        self.cursor = 0;
        self.phase = SessionPhase::Sync;
        Ok(())
    }

    /// Primary joint on the controller's trajectory, plus every other
    /// calibration joint with a completed calibration on its own
    fn build_joint_targets(
        &self,
        primary_trajectory: &TargetTrajectory,
    ) -> AppResult<Vec<JointTarget>> {
        let primary = self.exercise.primary_joint();
        let exercise_type = self.exercise.exercise_type();
        let default_weight = self.config.dtw.default_joint_weight;

        let mut targets = vec![JointTarget {
            joint: primary,
            weight: exercise_type.joint_weight(primary, default_weight),
            trajectory: primary_trajectory.clone(),
        }];
        for joint in self.exercise.calibration_joints() {
            if joint == primary {
                continue;
            }
            let Some(user_max) = self
                .profile
                .calibration(joint)
                .filter(|c| c.state == CalibrationState::Completed)
                .map(|c| c.max_angle)
            else {
                continue;
            };
            let trajectory = TargetRescaler::generate_target_trajectory(
                self.exercise.reference_angles(),
                user_max,
                self.exercise.duration_ms(),
                self.exercise.fps(),
                self.config.rescaling.challenge_factor,
            )
            .map_err(|e| e.with_session_id(self.session_id))?;
            targets.push(JointTarget {
                joint,
                weight: exercise_type.joint_weight(joint, default_weight),
                trajectory,
            });
        }
        Ok(targets)
    }

    fn measure_primary(&self, detection: &PoseDetection) -> AppResult<Option<f64>> {
        let Some(frame) = detection.frame() else {
            return Ok(None);
        };
        match self
            .kinematics
            .joint_angle(frame, self.exercise.primary_joint())
        {
            Ok(angle) => Ok(angle),
            Err(e) if e.is_session_fatal() => Err(e.with_session_id(self.session_id)),
            Err(e) => {
                debug!(session.id = %self.session_id, error = %e, "Primary joint not measurable");
                Ok(None)
            }
        }
    }

    fn measure_secondary(&self, frame: &LandmarkFrame, joint: JointType) -> Option<f64> {
        match self.kinematics.joint_angle(frame, joint) {
            Ok(angle) => angle,
            Err(e) => {
                debug!(
                    session.id = %self.session_id,
                    joint = %joint,
                    error = %e,
                    "Joint not measurable"
                );
                None
            }
        }
    }

    fn process_sync(
        &mut self,
        input: &FrameInput,
        (pain_level, pain_alert): (Option<PainLevel>, bool),
    ) -> AppResult<FrameOutput> {
        let user_angle = self.measure_primary(&input.detection)?;
        let Some(sync) = self.sync.as_mut() else {
            self.enter_sync()?;
            return self.process_sync(input, (pain_level, pain_alert));
        };

        let reps_before = sync.state().rep_count;
        let checkpoint_before = sync.state().checkpoint_index;
        let state = sync.update(user_angle, self.cursor, input.timestamp_ms);
        let skipped_frame = (state.status == SyncStatus::Skip)
            .then(|| sync.exercise().checkpoints().get(checkpoint_before))
            .flatten()
            .map(|c| c.frame_index);

        let (joint_errors, multi_joint_score) =
            self.score_joints(&input.detection, user_angle, state.reference_frame);
        if let Some(score) = multi_joint_score {
            self.update_realtime_score(score);
        }

        if let Some(angle) = user_angle {
            self.scorer.add_frame(angle, input.timestamp_ms, state.phase);
            if state.target_angle > 0.0 {
                self.push_window_sample(angle, state.target_angle);
            }
        }

        let completed_rep = if state.rep_count > reps_before {
            Some(self.complete_rep(input.timestamp_ms))
        } else {
            None
        };

        self.advance_cursor(state.status, skipped_frame);

        if state.status == SyncStatus::Complete {
            info!(session.id = %self.session_id, reps = state.rep_count, "Exercise complete");
            self.finalize();
        }

        Ok(FrameOutput::sync(SyncOutput {
            state,
            user_angle,
            realtime_score: self.realtime_score,
            multi_joint_score,
            average_score: self.average_score(),
            joint_errors,
            completed_rep,
            scorer: self.scorer.current_status(),
            pain_level,
            pain_alert,
        }))
    }

    fn advance_cursor(&mut self, status: SyncStatus, skipped_frame: Option<u32>) {
        let last_frame = self.exercise.total_frames().saturating_sub(1);
        self.cursor = match (status, skipped_frame) {
            (SyncStatus::Skip, Some(frame)) => frame.saturating_add(1),
            (status, _) if status.holds_reference() => self.cursor,
            _ => self.cursor.saturating_add(1),
        }
        .min(last_frame);
    }

    /// Per-joint errors and their weighted score against the targets at
    /// `reference_frame`. Joints whose target is at rest are reported but
    /// not scored; the score is `None` when nothing could be scored.
    fn score_joints(
        &self,
        detection: &PoseDetection,
        primary_angle: Option<f64>,
        reference_frame: u32,
    ) -> (Vec<JointError>, Option<f64>) {
        let Some(frame) = detection.frame() else {
            return (Vec::new(), None);
        };
        let primary = self.exercise.primary_joint();
        let at_ms = self.exercise.frame_to_ms(reference_frame);

        let mut joint_errors = Vec::with_capacity(self.joint_targets.len());
        let mut weighted_score = 0.0;
        let mut total_weight = 0.0;
        for target in &self.joint_targets {
            let measured = if target.joint == primary {
                primary_angle
            } else {
                self.measure_secondary(frame, target.joint)
            };
            let Some(user_angle) = measured else {
                continue;
            };

            let target_angle = target.trajectory.target_at(at_ms);
            let error = (user_angle - target_angle).abs();
            let (error_percent, score) = if target_angle > 0.0 {
                let error_percent = error / target_angle * 100.0;
                (error_percent, Some(realtime_frame_score(error_percent)))
            } else {
                (0.0, None)
            };
            if let Some(score) = score {
                weighted_score = score.mul_add(target.weight, weighted_score);
                total_weight += target.weight;
            }
            joint_errors.push(JointError {
                joint: target.joint,
                user_angle,
                target_angle,
                error,
                error_percent,
                score,
                weight: target.weight,
            });
        }

        let score = (total_weight > 0.0).then(|| weighted_score / total_weight);
        (joint_errors, score)
    }

    fn update_realtime_score(&mut self, frame_score: f64) {
        self.realtime_score = REALTIME_EMA_RETAIN.mul_add(
            self.realtime_score,
            (1.0 - REALTIME_EMA_RETAIN) * frame_score,
        );
        self.score_total += frame_score;
        self.scored_frames += 1;
    }

    fn average_score(&self) -> f64 {
        if self.scored_frames == 0 {
            0.0
        } else {
            self.score_total / f64::from(self.scored_frames)
        }
    }

    fn push_window_sample(&mut self, user_angle: f64, target_angle: f64) {
        let capacity = self.config.dtw.rep_window;
        self.user_window.push(user_angle);
        self.reference_window.push(target_angle);
        for window in [&mut self.user_window, &mut self.reference_window] {
            if window.len() > capacity {
                let excess = window.len() - capacity;
                window.drain(..excess);
            }
        }
    }

    fn complete_rep(&mut self, timestamp_ms: u64) -> RepScore {
        let min_samples = self.config.dtw.min_rep_samples;
        let dtw = (self.user_window.len() > min_samples
            && self.reference_window.len() > min_samples)
            .then(|| {
                self.dtw
                    .analyze_joint(&self.user_window, &self.reference_window)
            });
        let target = self
            .sync
            .as_ref()
            .map_or(0.0, |sync| sync.trajectory().peak());

        let score = self.scorer.complete_rep(target, dtw.as_ref());
        self.emit(SessionEvent::RepCompleted {
            session_id: self.session_id,
            rep_number: score.rep_number,
            total_score: score.total_score,
            timestamp_ms,
        });

        let fatigue = self.scorer.fatigue_level();
        if fatigue >= FatigueLevel::Moderate {
            self.emit(SessionEvent::FatigueWarning {
                session_id: self.session_id,
                level: fatigue,
                timestamp_ms,
            });
        }
        score
    }

    /// Build the report once; later calls return the cached copy
    fn finalize(&mut self) -> SessionReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        match &mut self.pain {
            PainChannel::Inline(monitor) => {
                if let Some(event) = monitor.finish(self.last_timestamp_ms) {
                    self.scorer.add_pain_event(event);
                }
            }
            PainChannel::Worker(worker) => {
                for event in worker.drain_events() {
                    self.scorer.add_pain_event(event);
                }
            }
        }

        let report = self.scorer.session_report(Utc::now());
        self.emit(SessionEvent::SessionEnded {
            session_id: self.session_id,
            total_reps: report.total_reps,
            average_score: report.average_scores.total,
            timestamp_ms: self.last_timestamp_ms,
        });
        self.phase = SessionPhase::FinalReport;
        self.report = Some(report.clone());
        report
    }
}

/// Live score from the percentage error against the target
#[must_use]
pub fn realtime_frame_score(error_percent: f64) -> f64 {
    if error_percent < 5.0 {
        100.0
    } else if error_percent < 10.0 {
        95.0 - (error_percent - 5.0)
    } else if error_percent < 15.0 {
        2.0f64.mul_add(-(error_percent - 10.0), 90.0)
    } else if error_percent < 25.0 {
        1.5f64.mul_add(-(error_percent - 15.0), 80.0)
    } else if error_percent < 40.0 {
        65.0 - (error_percent - 25.0)
    } else {
        0.5f64.mul_add(-(error_percent - 40.0), 50.0).max(0.0)
    }
}
