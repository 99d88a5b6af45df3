// ABOUTME: Calibration profile persistence keyed by user id
// ABOUTME: In-memory DashMap store and a one-JSON-file-per-user directory store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Calibration profile storage used by the session store

use crate::errors::{AppError, AppResult};
use crate::models::UserProfile;
use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for user calibration profiles
pub trait ProfileStore: Send + Sync {
    /// Load a profile; `Ok(None)` when the user has none yet
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` or `SERIALIZATION_ERROR` when the backend fails
    fn load(&self, user_id: &str) -> AppResult<Option<UserProfile>>;

    /// Insert or replace a profile
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` or `SERIALIZATION_ERROR` when the backend fails
    fn save(&self, profile: &UserProfile) -> AppResult<()>;

    /// Remove a profile; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` when the backend fails
    fn delete(&self, user_id: &str) -> AppResult<bool>;

    /// Load a profile or start a fresh one
    ///
    /// # Errors
    ///
    /// Propagates [`ProfileStore::load`] failures
    fn load_or_new(&self, user_id: &str, name: &str) -> AppResult<UserProfile> {
        Ok(self
            .load(user_id)?
            .unwrap_or_else(|| UserProfile::new(user_id, name)))
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, UserProfile>,
}

impl InMemoryProfileStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.value().clone()))
    }

    fn save(&self, profile: &UserProfile) -> AppResult<()> {
        self.profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.profiles.remove(user_id).is_some())
    }
}

/// One `<user_id>.json` file per user under a directory
#[derive(Debug, Clone)]
pub struct JsonFileProfileStore {
    directory: PathBuf,
}

impl JsonFileProfileStore {
    /// Open a store rooted at `directory`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` if the directory cannot be created
    pub fn open(directory: impl Into<PathBuf>) -> AppResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Root directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, user_id: &str) -> AppResult<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::invalid_input(format!(
                "User id '{user_id}' is not usable as a profile file name"
            )));
        }
        Ok(self.directory.join(format!("{user_id}.json")))
    }
}

impl ProfileStore for JsonFileProfileStore {
    fn load(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let path = self.path_for(user_id)?;
        match fs::read_to_string(&path) {
            Ok(json) => UserProfile::from_json(&json).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::from(e).with_user_id(user_id)),
        }
    }

    fn save(&self, profile: &UserProfile) -> AppResult<()> {
        let path = self.path_for(&profile.user_id)?;
        let json = profile.to_json()?;
        // Stage the write, then rename over the target
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &path)?;
        debug!(user.id = %profile.user_id, path = %path.display(), "Profile saved");
        Ok(())
    }

    fn delete(&self, user_id: &str) -> AppResult<bool> {
        let path = self.path_for(user_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::from(e).with_user_id(user_id)),
        }
    }
}
