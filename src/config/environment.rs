// ABOUTME: Environment configuration for deployment-specific settings of the motion engine
// ABOUTME: Reads deployment mode, profile storage location and pain worker mode from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Environment-based runtime configuration

use crate::intelligence::config::EngineConfig;
use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Whether this is a production deployment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Everything the calling layer needs to host sessions
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Algorithm configuration
    pub engine: EngineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Directory for JSON profiles; `None` keeps profiles in memory
    pub profile_dir: Option<PathBuf>,
    /// Run pain analysis on a background worker
    pub pain_worker: bool,
}

impl RuntimeConfig {
    /// Load from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an engine override cannot be parsed or the engine
    /// configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading runtime configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env::var("ENVIRONMENT").unwrap_or_default());
        let engine = EngineConfig::load().context("Invalid engine configuration")?;
        let profile_dir = env::var("PROFILE_DIR").ok().map(PathBuf::from);
        let pain_worker = env::var("PAIN_WORKER")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            environment,
            engine,
            logging: LoggingConfig::from_env(),
            profile_dir,
            pain_worker,
        })
    }
}
