// ABOUTME: Engine configuration sections for every motion-analysis component
// ABOUTME: Defaults come from the algorithm constants; env overrides are applied and validated on load
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use super::error::ConfigError;
use crate::constants::{
    calibration, detection, dtw, kinematics, normalizer, pain, rescaling, scoring, sync,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Joint angle computation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinematicsConfig {
    /// Use the depth coordinate when computing angles
    pub use_3d: bool,
    /// Landmarks below this visibility make a joint unavailable
    pub min_visibility: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            use_3d: true,
            min_visibility: kinematics::DEFAULT_MIN_VISIBILITY,
        }
    }
}

/// Skeleton normalizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Restrict alignment to torso and limb landmarks
    pub use_core_landmarks: bool,
    /// Decay constant in `exp(-k * disparity)`
    pub similarity_decay: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            use_core_landmarks: true,
            similarity_decay: normalizer::SIMILARITY_DECAY,
        }
    }
}

/// DTW rhythm analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtwConfig {
    /// Moving-average window applied before alignment
    pub smoothing_window: usize,
    /// Decay constant in `100 * exp(-k * distance)`
    pub similarity_decay: f64,
    /// Weight for joints the exercise preset does not name
    pub default_joint_weight: f64,
    /// Trailing samples compared when a rep completes
    pub rep_window: usize,
    /// Samples each side needs before a rep is compared
    pub min_rep_samples: usize,
}

impl Default for DtwConfig {
    fn default() -> Self {
        Self {
            smoothing_window: dtw::SMOOTHING_WINDOW,
            similarity_decay: dtw::SIMILARITY_DECAY,
            default_joint_weight: dtw::DEFAULT_JOINT_WEIGHT,
            rep_window: dtw::REP_WINDOW,
            min_rep_samples: dtw::MIN_REP_SAMPLES,
        }
    }
}

/// Safe-max calibration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Collection window per joint (ms)
    pub duration_ms: u64,
    /// Raw samples required for a valid window
    pub min_samples: usize,
    /// Samples required after outlier rejection
    pub min_clean_samples: usize,
    /// Sliding median window (samples)
    pub median_window: usize,
    /// Outlier cutoff in scaled MADs
    pub outlier_mad_threshold: f64,
    /// Percentile reported as the safe maximum
    pub max_percentile: f64,
    /// Percentile reported as the minimum
    pub min_percentile: f64,
    /// Countdown before each joint's window (ms)
    pub countdown_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: calibration::DURATION_MS,
            min_samples: calibration::MIN_SAMPLES,
            min_clean_samples: calibration::MIN_CLEAN_SAMPLES,
            median_window: calibration::MEDIAN_WINDOW,
            outlier_mad_threshold: calibration::OUTLIER_MAD_THRESHOLD,
            max_percentile: calibration::MAX_PERCENTILE,
            min_percentile: calibration::MIN_PERCENTILE,
            countdown_ms: calibration::COUNTDOWN_MS,
        }
    }
}

/// Target rescaling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescalingConfig {
    /// Extra challenge on top of the user's range
    pub challenge_factor: f64,
    /// Tolerance for "good" tracking (degrees)
    pub tolerance_deg: f64,
    /// Share of the tolerance counted as "perfect"
    pub perfect_ratio: f64,
}

impl Default for RescalingConfig {
    fn default() -> Self {
        Self {
            challenge_factor: rescaling::CHALLENGE_FACTOR,
            tolerance_deg: rescaling::TOLERANCE_DEG,
            perfect_ratio: rescaling::PERFECT_RATIO,
        }
    }
}

/// Synchronization controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Consecutive satisfied updates needed to pass a checkpoint
    pub confirm_frames: u32,
    /// Wait before the reference segment loops (ms)
    pub loop_after_ms: u64,
    /// Wait before a checkpoint is skipped (ms)
    pub max_wait_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            confirm_frames: sync::CONFIRM_FRAMES,
            loop_after_ms: sync::LOOP_AFTER_MS,
            max_wait_ms: sync::MAX_WAIT_MS,
        }
    }
}

/// Scoring engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// ROM weight in the total score
    pub rom_weight: f64,
    /// Stability weight in the total score
    pub stability_weight: f64,
    /// Flow weight in the total score
    pub flow_weight: f64,
    /// Frames a rep needs to be scored
    pub min_rep_frames: usize,
    /// Reps averaged against the jerk baseline
    pub fatigue_window: usize,
    /// Jerk increase (%) for light fatigue
    pub fatigue_light_percent: f64,
    /// Jerk increase (%) for moderate fatigue
    pub fatigue_moderate_percent: f64,
    /// Jerk increase (%) for heavy fatigue
    pub fatigue_heavy_percent: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rom_weight: scoring::ROM_WEIGHT,
            stability_weight: scoring::STABILITY_WEIGHT,
            flow_weight: scoring::FLOW_WEIGHT,
            min_rep_frames: scoring::MIN_REP_FRAMES,
            fatigue_window: scoring::FATIGUE_WINDOW,
            fatigue_light_percent: scoring::FATIGUE_LIGHT_PERCENT,
            fatigue_moderate_percent: scoring::FATIGUE_MODERATE_PERCENT,
            fatigue_heavy_percent: scoring::FATIGUE_HEAVY_PERCENT,
        }
    }
}

/// Pain heuristic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainConfig {
    /// Facial score at which pain is mild
    pub mild_threshold: f64,
    /// Facial score at which pain is moderate
    pub moderate_threshold: f64,
    /// Facial score at which pain is severe
    pub severe_threshold: f64,
    /// Minimum episode length before an event is recorded (ms)
    pub min_event_duration_ms: u64,
    /// Bounded queue capacity for the pain worker
    pub queue_capacity: usize,
}

impl Default for PainConfig {
    fn default() -> Self {
        Self {
            mild_threshold: pain::MILD_THRESHOLD,
            moderate_threshold: pain::MODERATE_THRESHOLD,
            severe_threshold: pain::SEVERE_THRESHOLD,
            min_event_duration_ms: pain::MIN_EVENT_DURATION_MS,
            queue_capacity: pain::QUEUE_CAPACITY,
        }
    }
}

/// Pose detection phase settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Consecutive detections before the countdown starts
    pub stable_frames_required: u32,
    /// Countdown after a stable pose (ms)
    pub countdown_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            stable_frames_required: detection::STABLE_FRAMES_REQUIRED,
            countdown_ms: detection::COUNTDOWN_MS,
        }
    }
}

/// Configuration for every engine component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Joint angle computation
    pub kinematics: KinematicsConfig,
    /// Skeleton alignment
    pub normalizer: NormalizerConfig,
    /// DTW rhythm analysis
    pub dtw: DtwConfig,
    /// Safe-max calibration
    pub calibration: CalibrationConfig,
    /// Target rescaling
    pub rescaling: RescalingConfig,
    /// Synchronization controller
    pub sync: SyncConfig,
    /// Repetition scoring
    pub scoring: ScoringConfig,
    /// Pain heuristic
    pub pain: PainConfig,
    /// Pose detection phase
    pub detection: DetectionConfig,
}

impl EngineConfig {
    /// Load configuration: defaults, then environment overrides, then validation
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable value or
    /// the resulting configuration fails validation
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::default().apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.kinematics.min_visibility) {
            return Err(ConfigError::ValueOutOfRange(
                "min_visibility must be between 0 and 1",
            ));
        }
        if self.normalizer.similarity_decay <= 0.0 || self.dtw.similarity_decay <= 0.0 {
            return Err(ConfigError::ValueOutOfRange(
                "similarity decay constants must be positive",
            ));
        }
        if self.dtw.smoothing_window == 0 || self.dtw.rep_window == 0 {
            return Err(ConfigError::ValueOutOfRange("DTW windows must be positive"));
        }
        if self.dtw.default_joint_weight < 0.0 {
            return Err(ConfigError::ValueOutOfRange(
                "default_joint_weight must not be negative",
            ));
        }

        self.validate_calibration()?;

        if self.rescaling.challenge_factor < 0.0 {
            return Err(ConfigError::ValueOutOfRange(
                "challenge_factor must not be negative",
            ));
        }
        if self.rescaling.tolerance_deg <= 0.0 {
            return Err(ConfigError::ValueOutOfRange("tolerance_deg must be positive"));
        }
        if self.rescaling.perfect_ratio <= 0.0 || self.rescaling.perfect_ratio > 1.0 {
            return Err(ConfigError::ValueOutOfRange(
                "perfect_ratio must be in (0, 1]",
            ));
        }

        if self.sync.confirm_frames == 0 || self.sync.max_wait_ms == 0 {
            return Err(ConfigError::ValueOutOfRange(
                "confirm_frames and max_wait_ms must be positive",
            ));
        }
        if self.sync.loop_after_ms > self.sync.max_wait_ms {
            return Err(ConfigError::InvalidRange(
                "loop_after_ms must be <= max_wait_ms",
            ));
        }

        self.validate_scoring()?;
        self.validate_pain()?;

        if self.detection.stable_frames_required == 0 {
            return Err(ConfigError::ValueOutOfRange(
                "stable_frames_required must be positive",
            ));
        }

        Ok(())
    }

    fn validate_calibration(&self) -> Result<(), ConfigError> {
        let cal = &self.calibration;
        if cal.duration_ms == 0 || cal.median_window == 0 || cal.min_samples == 0 {
            return Err(ConfigError::ValueOutOfRange(
                "calibration duration, window and sample count must be positive",
            ));
        }
        if cal.min_clean_samples > cal.min_samples {
            return Err(ConfigError::InvalidRange(
                "min_clean_samples must be <= min_samples",
            ));
        }
        if cal.outlier_mad_threshold <= 0.0 {
            return Err(ConfigError::ValueOutOfRange(
                "outlier_mad_threshold must be positive",
            ));
        }
        let percentiles = 0.0..=100.0;
        if !percentiles.contains(&cal.max_percentile) || !percentiles.contains(&cal.min_percentile)
        {
            return Err(ConfigError::ValueOutOfRange(
                "calibration percentiles must be between 0 and 100",
            ));
        }
        if cal.min_percentile >= cal.max_percentile {
            return Err(ConfigError::InvalidRange(
                "min_percentile must be < max_percentile",
            ));
        }
        Ok(())
    }

    fn validate_scoring(&self) -> Result<(), ConfigError> {
        let sc = &self.scoring;
        let weight_sum = sc.rom_weight + sc.stability_weight + sc.flow_weight;
        if (weight_sum - 1.0).abs() > 0.01
            || sc.rom_weight < 0.0
            || sc.stability_weight < 0.0
            || sc.flow_weight < 0.0
        {
            return Err(ConfigError::InvalidWeights(
                "Scoring weights must be non-negative and sum to 1.0",
            ));
        }
        if sc.fatigue_window == 0 {
            return Err(ConfigError::ValueOutOfRange("fatigue_window must be positive"));
        }
        if sc.fatigue_light_percent >= sc.fatigue_moderate_percent
            || sc.fatigue_moderate_percent >= sc.fatigue_heavy_percent
        {
            return Err(ConfigError::InvalidRange(
                "Fatigue thresholds must be in ascending order",
            ));
        }
        Ok(())
    }

    fn validate_pain(&self) -> Result<(), ConfigError> {
        let p = &self.pain;
        if p.mild_threshold >= p.moderate_threshold || p.moderate_threshold >= p.severe_threshold {
            return Err(ConfigError::InvalidRange(
                "Pain thresholds must be in ascending order",
            ));
        }
        if p.queue_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange("queue_capacity must be positive"));
        }
        Ok(())
    }

    /// Helper function to parse and apply an environment variable override
    fn apply_env_var<T: FromStr>(env_var_name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Ok(val) = env::var(env_var_name) {
            *target = val
                .parse()
                .map_err(|_| ConfigError::Parse(format!("Invalid {env_var_name}")))?;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        Self::apply_env_var("KINEMATICS_USE_3D", &mut self.kinematics.use_3d)?;
        Self::apply_env_var(
            "KINEMATICS_MIN_VISIBILITY",
            &mut self.kinematics.min_visibility,
        )?;

        Self::apply_env_var("NORMALIZER_USE_CORE", &mut self.normalizer.use_core_landmarks)?;
        Self::apply_env_var(
            "NORMALIZER_SIMILARITY_DECAY",
            &mut self.normalizer.similarity_decay,
        )?;

        Self::apply_env_var("DTW_SMOOTHING_WINDOW", &mut self.dtw.smoothing_window)?;
        Self::apply_env_var("DTW_SIMILARITY_DECAY", &mut self.dtw.similarity_decay)?;
        Self::apply_env_var("DTW_REP_WINDOW", &mut self.dtw.rep_window)?;

        Self::apply_env_var("CALIBRATION_DURATION_MS", &mut self.calibration.duration_ms)?;
        Self::apply_env_var("CALIBRATION_MIN_SAMPLES", &mut self.calibration.min_samples)?;
        Self::apply_env_var(
            "CALIBRATION_MEDIAN_WINDOW",
            &mut self.calibration.median_window,
        )?;
        Self::apply_env_var(
            "CALIBRATION_MAD_THRESHOLD",
            &mut self.calibration.outlier_mad_threshold,
        )?;
        Self::apply_env_var(
            "CALIBRATION_MAX_PERCENTILE",
            &mut self.calibration.max_percentile,
        )?;

        Self::apply_env_var(
            "RESCALING_CHALLENGE_FACTOR",
            &mut self.rescaling.challenge_factor,
        )?;
        Self::apply_env_var("RESCALING_TOLERANCE_DEG", &mut self.rescaling.tolerance_deg)?;

        Self::apply_env_var("SYNC_CONFIRM_FRAMES", &mut self.sync.confirm_frames)?;
        Self::apply_env_var("SYNC_LOOP_AFTER_MS", &mut self.sync.loop_after_ms)?;
        Self::apply_env_var("SYNC_MAX_WAIT_MS", &mut self.sync.max_wait_ms)?;

        Self::apply_env_var("SCORING_ROM_WEIGHT", &mut self.scoring.rom_weight)?;
        Self::apply_env_var(
            "SCORING_STABILITY_WEIGHT",
            &mut self.scoring.stability_weight,
        )?;
        Self::apply_env_var("SCORING_FLOW_WEIGHT", &mut self.scoring.flow_weight)?;
        Self::apply_env_var("SCORING_MIN_REP_FRAMES", &mut self.scoring.min_rep_frames)?;
        Self::apply_env_var("SCORING_FATIGUE_WINDOW", &mut self.scoring.fatigue_window)?;

        Self::apply_env_var("PAIN_MILD_THRESHOLD", &mut self.pain.mild_threshold)?;
        Self::apply_env_var("PAIN_MODERATE_THRESHOLD", &mut self.pain.moderate_threshold)?;
        Self::apply_env_var("PAIN_SEVERE_THRESHOLD", &mut self.pain.severe_threshold)?;
        Self::apply_env_var("PAIN_QUEUE_CAPACITY", &mut self.pain.queue_capacity)?;

        Self::apply_env_var(
            "DETECTION_STABLE_FRAMES",
            &mut self.detection.stable_frames_required,
        )?;
        Self::apply_env_var("DETECTION_COUNTDOWN_MS", &mut self.detection.countdown_ms)?;

        Ok(self)
    }
}
