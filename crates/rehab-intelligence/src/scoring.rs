// ABOUTME: Per-repetition ROM, stability and flow scoring with jerk-based fatigue estimation
// ABOUTME: Aggregates reps, fatigue trend and pain episodes into an end-of-session report
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Scoring Engine
//!
//! Frames are buffered per repetition and scored when the synchronization
//! controller reports a completed rep:
//!
//! - **ROM**: `0.4 * peak/target + 0.3 * hold time + 0.3 * peak steadiness`
//! - **Stability**: spread, oscillation and drift during the HOLD phase
//! - **Flow**: DTW similarity against the reference, or velocity smoothness
//!
//! Jerk (third derivative of the angle) feeds the fatigue estimate.

use crate::config::ScoringConfig;
use crate::constants::scoring::{
    DEFAULT_STABILITY_SCORE, HOLD_TARGET_RATIO, MAX_DRIFT_DEG, MIN_BASELINE_JERK, MIN_DT_SECS,
    OSCILLATION_THRESHOLD_DEG,
};
use crate::dtw::{DtwAnalyzer, DtwResult};
use crate::models::MotionPhase;
use crate::pain::{PainEvent, PainLevel, PainSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Frames a dimension needs before it is scored from data
const MIN_DIMENSION_FRAMES: usize = 5;

/// Ordered fatigue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatigueLevel {
    /// No measurable fatigue
    Fresh,
    /// Light fatigue
    Light,
    /// Moderate fatigue
    Moderate,
    /// Heavy fatigue
    Heavy,
}

impl fmt::Display for FatigueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fresh => "FRESH",
            Self::Light => "LIGHT",
            Self::Moderate => "MODERATE",
            Self::Heavy => "HEAVY",
        };
        f.write_str(name)
    }
}

/// Direction of jerk over the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueTrend {
    /// Jerk more than doubled
    IncreasingFast,
    /// Jerk rose by more than 30 %
    Increasing,
    /// No significant change
    Stable,
    /// Jerk fell by more than 20 %
    Improving,
}

/// Score of one completed repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepScore {
    /// 1-based repetition number
    pub rep_number: u32,
    /// Range of motion score (0-100)
    pub rom_score: f64,
    /// Hold stability score (0-100)
    pub stability_score: f64,
    /// Rhythm / smoothness score (0-100)
    pub flow_score: f64,
    /// Squared jerk per second
    pub jerk_value: f64,
    /// Weighted total (0-100)
    pub total_score: f64,
    /// Repetition length (ms)
    pub duration_ms: u64,
    /// Remarks such as fatigue or insufficient data
    pub notes: String,
}

/// Jerk-based fatigue assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueAnalysis {
    /// First-half versus second-half trend
    pub trend: FatigueTrend,
    /// Current fatigue level
    pub fatigue_level: FatigueLevel,
    /// Second-half jerk increase over the first half (%)
    pub jerk_increase_percent: f64,
    /// Jerk per repetition
    pub jerk_values: Vec<f64>,
}

/// Mean score per dimension
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageScores {
    /// Mean ROM score
    pub rom: f64,
    /// Mean stability score
    pub stability: f64,
    /// Mean flow score
    pub flow: f64,
    /// Mean total score
    pub total: f64,
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session identifier
    pub session_id: Uuid,
    /// Exercise performed
    pub exercise_name: String,
    /// Session start
    pub start_time: DateTime<Utc>,
    /// Session end
    pub end_time: DateTime<Utc>,
    /// Repetitions scored
    pub total_reps: usize,
    /// Every repetition score
    pub rep_scores: Vec<RepScore>,
    /// Mean per dimension
    pub average_scores: AverageScores,
    /// Letter grade of the mean total
    pub grade: char,
    /// Fatigue assessment
    pub fatigue_analysis: FatigueAnalysis,
    /// Pain episodes
    pub pain_events: Vec<PainEvent>,
    /// Pain aggregate
    pub pain_summary: PainSummary,
    /// Advice for the user
    pub recommendations: Vec<String>,
}

/// Snapshot for live display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorerStatus {
    /// Repetitions scored so far
    pub rep_count: usize,
    /// Total score of the last rep
    pub last_score: f64,
    /// Mean total score
    pub average_score: f64,
    /// Current fatigue level
    pub fatigue_level: FatigueLevel,
}

/// Scores repetitions for one session
#[derive(Debug, Clone)]
pub struct HealthScorer {
    config: ScoringConfig,
    session_id: Uuid,
    exercise_name: String,
    start_time: DateTime<Utc>,
    rep_scores: Vec<RepScore>,
    angles: Vec<f64>,
    timestamps_ms: Vec<u64>,
    phases: Vec<MotionPhase>,
    jerk_values: Vec<f64>,
    baseline_jerk: Option<f64>,
    pain_events: Vec<PainEvent>,
}

impl HealthScorer {
    /// Create a scorer; call [`Self::start_session`] before feeding frames
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            session_id: Uuid::nil(),
            exercise_name: String::new(),
            start_time: Utc::now(),
            rep_scores: Vec::new(),
            angles: Vec::new(),
            timestamps_ms: Vec::new(),
            phases: Vec::new(),
            jerk_values: Vec::new(),
            baseline_jerk: None,
            pain_events: Vec::new(),
        }
    }

    /// Begin a session, clearing all history
    pub fn start_session(&mut self, exercise_name: impl Into<String>, session_id: Uuid) {
        self.session_id = session_id;
        self.exercise_name = exercise_name.into();
        self.start_time = Utc::now();
        self.rep_scores.clear();
        self.jerk_values.clear();
        self.baseline_jerk = None;
        self.pain_events.clear();
        self.reset_current_rep();
        info!(session.id = %session_id, exercise = %self.exercise_name, "Scoring session started");
    }

    /// Buffer one frame of the current repetition
    pub fn add_frame(&mut self, angle: f64, timestamp_ms: u64, phase: MotionPhase) {
        self.angles.push(angle);
        self.timestamps_ms.push(timestamp_ms);
        self.phases.push(phase);
    }

    /// Frames buffered for the current repetition
    #[must_use]
    pub fn current_rep_frames(&self) -> usize {
        self.angles.len()
    }

    /// Score the buffered repetition and start a new one
    pub fn complete_rep(&mut self, target_angle: f64, dtw: Option<&DtwResult>) -> RepScore {
        let rep_number = u32::try_from(self.rep_scores.len() + 1).unwrap_or(u32::MAX);

        if self.angles.len() < self.config.min_rep_frames {
            let score = RepScore {
                rep_number,
                rom_score: 0.0,
                stability_score: 0.0,
                flow_score: 0.0,
                jerk_value: 0.0,
                total_score: 0.0,
                duration_ms: 0,
                notes: "insufficient data".to_owned(),
            };
            debug!(rep_number, frames = self.angles.len(), "Rep too short to score");
            self.rep_scores.push(score.clone());
            self.reset_current_rep();
            return score;
        }

        let rom_score = rom_score(&self.angles, target_angle);
        let stability_score = stability_score(&self.angles, &self.phases);
        let flow_score = dtw.map_or_else(
            || {
                100.0
                    * DtwAnalyzer::analyze_speed_variation(&self.timestamps_ms, &self.angles)
                        .smoothness
            },
            |result| result.similarity_score,
        );
        let jerk_value = squared_jerk(&self.angles, &self.timestamps_ms);
        self.jerk_values.push(jerk_value);
        if self.baseline_jerk.is_none() && jerk_value > 0.0 {
            self.baseline_jerk = Some(jerk_value);
        }

        let total_score = self.config.flow_weight.mul_add(
            flow_score,
            self.config
                .rom_weight
                .mul_add(rom_score, self.config.stability_weight * stability_score),
        );
        let duration_ms = match (self.timestamps_ms.first(), self.timestamps_ms.last()) {
            (Some(first), Some(last)) => last.saturating_sub(*first),
            _ => 0,
        };
        let fatigue = self.fatigue_level();
        let notes = if fatigue == FatigueLevel::Fresh {
            String::new()
        } else {
            format!("Fatigue: {fatigue}")
        };

        let score = RepScore {
            rep_number,
            rom_score,
            stability_score,
            flow_score,
            jerk_value,
            total_score,
            duration_ms,
            notes,
        };
        info!(
            session.id = %self.session_id,
            rep.number = rep_number,
            rep.total = total_score,
            rep.rom = rom_score,
            rep.stability = stability_score,
            rep.flow = flow_score,
            "Rep scored"
        );
        self.rep_scores.push(score.clone());
        self.reset_current_rep();
        score
    }

    /// Record a pain episode for the report
    pub fn add_pain_event(&mut self, event: PainEvent) {
        self.pain_events.push(event);
    }

    /// Scored repetitions
    #[must_use]
    pub fn rep_scores(&self) -> &[RepScore] {
        &self.rep_scores
    }

    /// Fatigue from the recent jerk average versus the session baseline
    #[must_use]
    pub fn fatigue_level(&self) -> FatigueLevel {
        let Some(baseline) = self.baseline_jerk.filter(|b| *b > MIN_BASELINE_JERK) else {
            return FatigueLevel::Fresh;
        };
        if self.jerk_values.len() < 2 {
            return FatigueLevel::Fresh;
        }

        let window = self.config.fatigue_window.min(self.jerk_values.len());
        let recent = &self.jerk_values[self.jerk_values.len() - window..];
        let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let increase = (recent_mean / baseline - 1.0) * 100.0;

        if increase >= self.config.fatigue_heavy_percent {
            FatigueLevel::Heavy
        } else if increase >= self.config.fatigue_moderate_percent {
            FatigueLevel::Moderate
        } else if increase >= self.config.fatigue_light_percent {
            FatigueLevel::Light
        } else {
            FatigueLevel::Fresh
        }
    }

    /// Jerk trend over the whole session
    #[must_use]
    pub fn fatigue_analysis(&self) -> FatigueAnalysis {
        if self.jerk_values.len() < 2 {
            return FatigueAnalysis {
                trend: FatigueTrend::Stable,
                fatigue_level: FatigueLevel::Fresh,
                jerk_increase_percent: 0.0,
                jerk_values: self.jerk_values.clone(),
            };
        }

        let (first, second) = self.jerk_values.split_at(self.jerk_values.len() / 2);
        let first_mean = mean(first);
        let second_mean = mean(second);
        let jerk_increase_percent = if first_mean > MIN_BASELINE_JERK {
            (second_mean - first_mean) / first_mean * 100.0
        } else {
            0.0
        };
        let trend = if jerk_increase_percent > 100.0 {
            FatigueTrend::IncreasingFast
        } else if jerk_increase_percent > 30.0 {
            FatigueTrend::Increasing
        } else if jerk_increase_percent < -20.0 {
            FatigueTrend::Improving
        } else {
            FatigueTrend::Stable
        };

        FatigueAnalysis {
            trend,
            fatigue_level: self.fatigue_level(),
            jerk_increase_percent,
            jerk_values: self.jerk_values.clone(),
        }
    }

    /// Live status snapshot
    #[must_use]
    pub fn current_status(&self) -> ScorerStatus {
        ScorerStatus {
            rep_count: self.rep_scores.len(),
            last_score: self.rep_scores.last().map_or(0.0, |r| r.total_score),
            average_score: mean(&self.totals()),
            fatigue_level: self.fatigue_level(),
        }
    }

    /// Build the end-of-session report
    #[must_use]
    pub fn session_report(&self, end_time: DateTime<Utc>) -> SessionReport {
        let average_scores = if self.rep_scores.is_empty() {
            AverageScores::default()
        } else {
            AverageScores {
                rom: mean(&self.rep_scores.iter().map(|r| r.rom_score).collect::<Vec<_>>()),
                stability: mean(
                    &self
                        .rep_scores
                        .iter()
                        .map(|r| r.stability_score)
                        .collect::<Vec<_>>(),
                ),
                flow: mean(&self.rep_scores.iter().map(|r| r.flow_score).collect::<Vec<_>>()),
                total: mean(&self.totals()),
            }
        };
        let fatigue_analysis = self.fatigue_analysis();
        let pain_summary = PainSummary::from_events(&self.pain_events);
        let recommendations = self.recommendations(&average_scores, &fatigue_analysis);

        SessionReport {
            session_id: self.session_id,
            exercise_name: self.exercise_name.clone(),
            start_time: self.start_time,
            end_time,
            total_reps: self.rep_scores.len(),
            rep_scores: self.rep_scores.clone(),
            average_scores,
            grade: grade(average_scores.total),
            fatigue_analysis,
            pain_events: self.pain_events.clone(),
            pain_summary,
            recommendations,
        }
    }

    fn recommendations(&self, averages: &AverageScores, fatigue: &FatigueAnalysis) -> Vec<String> {
        let mut recommendations = Vec::new();

        if !self.rep_scores.is_empty() {
            if averages.rom < 70.0 {
                recommendations.push(
                    "You have not reached the target angle yet. Try a little further, but never push through pain."
                        .to_owned(),
                );
            } else if averages.rom >= 95.0 {
                recommendations.push("Excellent! You reached the target range very well.".to_owned());
            }
            if averages.stability < 60.0 {
                recommendations.push(
                    "Try to stay steadier while holding. Breathe evenly and focus.".to_owned(),
                );
            }
        }

        match fatigue.fatigue_level {
            FatigueLevel::Heavy => recommendations
                .push("You are very tired. Please rest and drink some water.".to_owned()),
            FatigueLevel::Moderate => recommendations
                .push("You seem a little tired. Take a short break before continuing.".to_owned()),
            FatigueLevel::Fresh | FatigueLevel::Light => {}
        }

        if !self.pain_events.is_empty() {
            let worst = PainSummary::from_events(&self.pain_events).max_level;
            let advice = if worst >= PainLevel::Moderate {
                "Signs of pain were detected. Rest, and contact your clinician if it persists."
            } else {
                "Some discomfort was detected. Tell your clinician if it continues after resting."
            };
            recommendations.push(advice.to_owned());
        }

        if recommendations.is_empty() {
            recommendations.push("Good session! See you next time.".to_owned());
        }
        recommendations
    }

    fn totals(&self) -> Vec<f64> {
        self.rep_scores.iter().map(|r| r.total_score).collect()
    }

    fn reset_current_rep(&mut self) {
        self.angles.clear();
        self.timestamps_ms.clear();
        self.phases.clear();
    }
}

/// Letter grade: A >= 90, B >= 80, C >= 70, D >= 60, otherwise F
#[must_use]
pub fn grade(score: f64) -> char {
    if score >= 90.0 {
        'A'
    } else if score >= 80.0 {
        'B'
    } else if score >= 70.0 {
        'C'
    } else if score >= 60.0 {
        'D'
    } else {
        'F'
    }
}

/// Squared jerk per second of an angle series.
///
/// Three successive finite differences over time steps floored at 1 µs; zero
/// for fewer than four samples or zero total duration.
#[must_use]
pub fn squared_jerk(angles: &[f64], timestamps_ms: &[u64]) -> f64 {
    let n = angles.len().min(timestamps_ms.len());
    if n < 4 {
        return 0.0;
    }
    let total_secs = timestamps_ms[n - 1].saturating_sub(timestamps_ms[0]) as f64 / 1000.0;
    if total_secs < MIN_DT_SECS {
        return 0.0;
    }

    let dt: Vec<f64> = timestamps_ms[..n]
        .windows(2)
        .map(|w| ((w[1] as f64 - w[0] as f64) / 1000.0).max(MIN_DT_SECS))
        .collect();
    let velocity: Vec<f64> = angles[..n]
        .windows(2)
        .zip(&dt)
        .map(|(a, d)| (a[1] - a[0]) / d)
        .collect();
    let acceleration: Vec<f64> = velocity
        .windows(2)
        .zip(&dt)
        .map(|(v, d)| (v[1] - v[0]) / d)
        .collect();
    let jerk_sum: f64 = acceleration
        .windows(2)
        .zip(&dt)
        .map(|(a, d)| ((a[1] - a[0]) / d).powi(2))
        .sum();

    jerk_sum / total_secs
}

fn rom_score(angles: &[f64], target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    if angles.len() < MIN_DIMENSION_FRAMES {
        return 0.0;
    }

    let (peak_index, peak) = angles
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, a)| {
            if a > best.1 {
                (i, a)
            } else {
                best
            }
        });
    let max_score = (peak / target * 100.0).min(100.0);

    let threshold = target * HOLD_TARGET_RATIO;
    let frames_near_target = angles.iter().filter(|a| **a >= threshold).count() as f64;
    let required = (angles.len() as f64 * 0.1).max(3.0);
    let hold_score = (frames_near_target / required).min(1.0) * 100.0;

    let window = (angles.len() / 10).max(3);
    let start = peak_index.saturating_sub(window);
    let end = (peak_index + window + 1).min(angles.len());
    let peak_region = &angles[start..end];
    let peak_quality = if peak_region.len() >= 3 {
        5.0f64.mul_add(-std_dev(peak_region), 100.0).max(0.0)
    } else {
        50.0
    };

    0.3f64
        .mul_add(peak_quality, 0.4f64.mul_add(max_score, 0.3 * hold_score))
        .clamp(0.0, 100.0)
}

fn stability_score(angles: &[f64], phases: &[MotionPhase]) -> f64 {
    let hold: Vec<f64> = angles
        .iter()
        .zip(phases)
        .filter(|(_, phase)| **phase == MotionPhase::Hold)
        .map(|(a, _)| *a)
        .collect();

    if hold.len() < MIN_DIMENSION_FRAMES {
        if angles.len() < MIN_DIMENSION_FRAMES {
            return DEFAULT_STABILITY_SCORE;
        }
        let diffs: Vec<f64> = angles.windows(2).map(|w| w[1] - w[0]).collect();
        return 5.0f64.mul_add(-std_dev(&diffs), 100.0).clamp(0.0, 100.0);
    }

    let std_score = 10.0f64.mul_add(-std_dev(&hold), 100.0).max(0.0);

    let center = mean(&hold);
    let crossings = hold
        .iter()
        .filter(|a| (**a - center).abs() > OSCILLATION_THRESHOLD_DEG)
        .count() as f64;
    let allowed = (hold.len() as f64 * 0.2).max(1.0);
    let oscillation_score = (1.0 - (crossings / allowed).min(1.0)) * 100.0;

    let (first, second) = hold.split_at(hold.len() / 2);
    let drift = mean(first) - mean(second);
    let drift_score = (1.0 - (drift.max(0.0) / MAX_DRIFT_DEG).min(1.0)) * 100.0;

    0.2f64
        .mul_add(
            drift_score,
            0.5f64.mul_add(std_score, 0.3 * oscillation_score),
        )
        .clamp(0.0, 100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = mean(values);
    (values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}
