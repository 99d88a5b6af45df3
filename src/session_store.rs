// ABOUTME: Caller-owned map of active sessions to their motion engines
// ABOUTME: Creates, drives and finalizes sessions by id and persists calibrations to a profile store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Session Store
//!
//! Routes frames to per-session engines. Profiles are loaded from the
//! injected [`ProfileStore`] when a session is created and written back
//! whenever a joint calibration completes and when the session ends, so
//! calibrations carry over to the user's next session.

use crate::engine::{FrameInput, FrameOutput, MotionEngine};
use crate::errors::{AppError, AppResult};
use crate::events::SessionEventSink;
use crate::intelligence::config::EngineConfig;
use crate::intelligence::{CalibrationOutcome, SessionReport};
use crate::models::{ExerciseDefinition, UserProfile};
use crate::pain_worker::PainWorker;
use crate::profile_store::{InMemoryProfileStore, ProfileStore};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared handle to one session's engine
pub type SharedEngine = Arc<Mutex<MotionEngine>>;

/// Active sessions keyed by session id
///
/// Owned and injected by the transport layer. Sessions share no state; the
/// map only routes frames to the right engine.
pub struct SessionStore {
    sessions: DashMap<Uuid, SharedEngine>,
    profiles: Arc<dyn ProfileStore>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_profile_store(Arc::new(InMemoryProfileStore::new()))
    }
}

impl SessionStore {
    /// Create an empty store backed by an in-memory profile store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store persisting profiles to `profiles`
    #[must_use]
    pub fn with_profile_store(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            profiles,
        }
    }

    /// Profile store shared by every session
    #[must_use]
    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    /// Start a session with inline pain handling.
    ///
    /// A stored profile for `profile.user_id` replaces the one passed in;
    /// `profile` is used for users seen for the first time.
    ///
    /// # Errors
    ///
    /// Returns the profile store's error, or `CONFIG_INVALID` for an invalid
    /// `config`
    pub fn create(
        &self,
        profile: UserProfile,
        exercise: ExerciseDefinition,
        config: EngineConfig,
        sink: Arc<dyn SessionEventSink>,
    ) -> AppResult<Uuid> {
        let session_id = Uuid::new_v4();
        let profile = self.resolve_profile(profile)?;
        let engine = MotionEngine::new(session_id, profile, exercise, config, sink)?;
        Ok(self.insert(engine))
    }

    /// Start a session whose pain scores go to a background worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`]
    pub fn create_with_pain_worker(
        &self,
        profile: UserProfile,
        exercise: ExerciseDefinition,
        config: EngineConfig,
        sink: Arc<dyn SessionEventSink>,
    ) -> AppResult<Uuid> {
        let session_id = Uuid::new_v4();
        let profile = self.resolve_profile(profile)?;
        let pain = config.pain.clone();
        let engine =
            MotionEngine::new(session_id, profile, exercise, config, Arc::clone(&sink))?;
        let worker = PainWorker::spawn(pain, sink, session_id);
        Ok(self.insert(engine.with_pain_worker(worker)))
    }

    fn resolve_profile(&self, profile: UserProfile) -> AppResult<UserProfile> {
        Ok(self.profiles.load(&profile.user_id)?.unwrap_or(profile))
    }

    fn insert(&self, engine: MotionEngine) -> Uuid {
        let session_id = engine.session_id();
        info!(
            session.id = %session_id,
            user.id = %engine.profile().user_id,
            calibrated_joints = engine.profile().joint_limits.len(),
            "Session created"
        );
        self.sessions.insert(session_id, Arc::new(Mutex::new(engine)));
        session_id
    }

    /// Storage failures are logged; they never end the session
    fn persist_profile(&self, session_id: Uuid, profile: &UserProfile) {
        if let Err(e) = self.profiles.save(profile) {
            warn!(
                session.id = %session_id,
                user.id = %profile.user_id,
                error = %e,
                "Failed to persist profile"
            );
        }
    }

    /// Engine for a session
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id
    pub fn get(&self, session_id: Uuid) -> AppResult<SharedEngine> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                AppError::not_found(format!("Session {session_id}")).with_session_id(session_id)
            })
    }

    /// Route one frame to its session
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id, or the engine's
    /// session-fatal error
    pub async fn process_frame(
        &self,
        session_id: Uuid,
        input: &FrameInput,
    ) -> AppResult<FrameOutput> {
        let engine = self.get(session_id)?;
        let mut engine = engine.lock().await;
        let output = engine.process_frame(input)?;

        let calibrated = matches!(
            output.calibration.as_ref().and_then(|c| c.outcome.as_ref()),
            Some(CalibrationOutcome::Completed(_))
        );
        if calibrated {
            self.persist_profile(session_id, engine.profile());
        }
        Ok(output)
    }

    /// Finalize a session, save its profile and remove it
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown id
    pub async fn end_session(&self, session_id: Uuid) -> AppResult<SessionReport> {
        let (_, engine) = self.sessions.remove(&session_id).ok_or_else(|| {
            AppError::not_found(format!("Session {session_id}")).with_session_id(session_id)
        })?;
        let mut engine = engine.lock().await;
        let report = engine.end_session();
        self.persist_profile(session_id, engine.profile());
        info!(session.id = %session_id, reps = report.total_reps, "Session ended");
        Ok(report)
    }

    /// Drop a session without producing a report; returns whether it existed
    pub fn remove(&self, session_id: Uuid) -> bool {
        self.sessions.remove(&session_id).is_some()
    }

    /// Number of active sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
