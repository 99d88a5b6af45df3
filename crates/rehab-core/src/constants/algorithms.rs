// ABOUTME: Numeric defaults for kinematics, normalization, DTW, calibration, sync and scoring
// ABOUTME: Each engine component reads its defaults from the submodule named after it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

/// Kinematics defaults
pub mod kinematics {
    /// Vector norm below which an angle is undefined
    pub const DEGENERATE_EPSILON: f64 = 1e-10;
    /// Minimum landmark visibility for a joint to be measured
    pub const DEFAULT_MIN_VISIBILITY: f64 = 0.5;
}

/// Skeleton normalizer defaults
pub mod normalizer {
    /// Frobenius norm below which scaling is skipped
    pub const NORM_EPSILON: f64 = 1e-10;
    /// Decay constant in `similarity = exp(-k * disparity)`
    pub const SIMILARITY_DECAY: f64 = 10.0;
}

/// DTW rhythm analyzer defaults
pub mod dtw {
    /// Moving-average smoothing window (samples)
    pub const SMOOTHING_WINDOW: usize = 5;
    /// Range below which min-max normalization is skipped
    pub const FLAT_RANGE_EPSILON: f64 = 1e-6;
    /// Decay constant in `score = 100 * exp(-k * distance)`
    pub const SIMILARITY_DECAY: f64 = 3.0;
    /// Weight for joints absent from an exercise preset
    pub const DEFAULT_JOINT_WEIGHT: f64 = 0.5;
    /// Weights below this are ignored
    pub const MIN_JOINT_WEIGHT: f64 = 1e-6;
    /// Score at or above which rhythm is "excellent"
    pub const EXCELLENT_THRESHOLD: f64 = 85.0;
    /// Score at or above which rhythm is "good"
    pub const GOOD_THRESHOLD: f64 = 70.0;
    /// Score at or above which rhythm is "fair"
    pub const FAIR_THRESHOLD: f64 = 50.0;
    /// Sentinel score returned for empty input
    pub const EMPTY_INPUT_SCORE: f64 = 100.0;
    /// Number of trailing samples compared at rep completion
    pub const REP_WINDOW: usize = 50;
    /// Samples each side needs before a rep is compared
    pub const MIN_REP_SAMPLES: usize = 20;
    /// Minimum time step for speed analysis (ms)
    pub const MIN_SPEED_DT_MS: f64 = 1.0;
}

/// Safe-max calibration defaults
pub mod calibration {
    /// Collection window (ms)
    pub const DURATION_MS: u64 = 5_000;
    /// Countdown before each joint's window (ms)
    pub const COUNTDOWN_MS: u64 = 3_000;
    /// Raw samples required for a valid window
    pub const MIN_SAMPLES: usize = 30;
    /// Samples required after outlier rejection
    pub const MIN_CLEAN_SAMPLES: usize = 10;
    /// Sliding median filter window (samples)
    pub const MEDIAN_WINDOW: usize = 5;
    /// Outlier cutoff in scaled median absolute deviations
    pub const OUTLIER_MAD_THRESHOLD: f64 = 3.0;
    /// Consistency constant making MAD comparable to a standard deviation
    pub const MAD_SCALE: f64 = 1.4826;
    /// Percentile taken as the calibrated maximum
    pub const MAX_PERCENTILE: f64 = 100.0;
    /// Percentile taken as the calibrated minimum
    pub const MIN_PERCENTILE: f64 = 0.0;
    /// Standard deviation (degrees) at which spread confidence reaches zero
    pub const CONFIDENCE_STD_SPAN: f64 = 30.0;
}

/// Target rescaling defaults
pub mod rescaling {
    /// Extra challenge applied on top of the user's range
    pub const CHALLENGE_FACTOR: f64 = 0.05;
    /// Amplitude below which a reference or user maximum counts as zero
    pub const AMPLITUDE_EPSILON: f64 = 1e-6;
    /// Tolerance (degrees) for "good" tracking
    pub const TOLERANCE_DEG: f64 = 15.0;
    /// Share of the tolerance counted as "perfect"
    pub const PERFECT_RATIO: f64 = 0.3;
}

/// Synchronization controller defaults
pub mod sync {
    /// Consecutive in-tolerance updates required to pass a checkpoint
    pub const CONFIRM_FRAMES: u32 = 2;
    /// Wait before the reference segment starts looping (ms)
    pub const LOOP_AFTER_MS: u64 = 3_000;
    /// Wait before a checkpoint is force-skipped (ms)
    pub const MAX_WAIT_MS: u64 = 8_000;
}

/// Scoring engine defaults
pub mod scoring {
    /// ROM weight in the total score
    pub const ROM_WEIGHT: f64 = 0.4;
    /// Stability weight in the total score
    pub const STABILITY_WEIGHT: f64 = 0.3;
    /// Flow weight in the total score
    pub const FLOW_WEIGHT: f64 = 0.3;
    /// Frames a rep needs to be scored
    pub const MIN_REP_FRAMES: usize = 10;
    /// Reps averaged when comparing jerk against the baseline
    pub const FATIGUE_WINDOW: usize = 3;
    /// Jerk increase (percent) for light fatigue
    pub const FATIGUE_LIGHT_PERCENT: f64 = 50.0;
    /// Jerk increase (percent) for moderate fatigue
    pub const FATIGUE_MODERATE_PERCENT: f64 = 100.0;
    /// Jerk increase (percent) for heavy fatigue
    pub const FATIGUE_HEAVY_PERCENT: f64 = 200.0;
    /// Minimum time step (seconds) for derivative estimates
    pub const MIN_DT_SECS: f64 = 1e-6;
    /// Mean jerk (deg/s^3) below which a baseline is too flat to compare against
    pub const MIN_BASELINE_JERK: f64 = 1e-6;
    /// Share of the target that counts as "near peak" for hold scoring
    pub const HOLD_TARGET_RATIO: f64 = 0.8;
    /// Hold-phase deviation (degrees) treated as an oscillation
    pub const OSCILLATION_THRESHOLD_DEG: f64 = 3.0;
    /// Hold-phase drift (degrees) that zeroes the drift score
    pub const MAX_DRIFT_DEG: f64 = 5.0;
    /// Score used when a dimension has too little data
    pub const DEFAULT_STABILITY_SCORE: f64 = 80.0;
    /// Weight of the previous value in the realtime score EMA
    pub const REALTIME_EMA_RETAIN: f64 = 0.7;
}

/// Pain heuristic defaults
pub mod pain {
    /// Facial score (0-100) at which pain is mild
    pub const MILD_THRESHOLD: f64 = 20.0;
    /// Facial score (0-100) at which pain is moderate
    pub const MODERATE_THRESHOLD: f64 = 45.0;
    /// Facial score (0-100) at which pain is severe
    pub const SEVERE_THRESHOLD: f64 = 70.0;
    /// Minimum episode length before an event is recorded (ms)
    pub const MIN_EVENT_DURATION_MS: u64 = 500;
    /// Bounded queue capacity for the pain worker
    pub const QUEUE_CAPACITY: usize = 5;
}

/// Pose detection phase defaults
pub mod detection {
    /// Consecutive detected frames before the countdown starts
    pub const STABLE_FRAMES_REQUIRED: u32 = 30;
    /// Countdown after a stable pose (ms)
    pub const COUNTDOWN_MS: u64 = 3_000;
}
