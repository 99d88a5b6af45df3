// ABOUTME: Pain episode tracking from an externally supplied 0-100 facial pain score
// ABOUTME: Classifies levels, records episodes longer than a minimum duration and raises alerts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

use crate::config::PainConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Ordered pain severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PainLevel {
    /// Below the mild threshold
    None,
    /// Mild discomfort
    Mild,
    /// Moderate pain
    Moderate,
    /// Severe pain
    Severe,
}

impl PainLevel {
    /// Classify a facial pain score
    #[must_use]
    pub fn from_score(score: f64, config: &PainConfig) -> Self {
        if score >= config.severe_threshold {
            Self::Severe
        } else if score >= config.moderate_threshold {
            Self::Moderate
        } else if score >= config.mild_threshold {
            Self::Mild
        } else {
            Self::None
        }
    }

    /// Advice shown for this level
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::None => "No pain detected",
            Self::Mild => "Mild discomfort detected, move gently",
            Self::Moderate => "Moderate pain detected, slow down or rest",
            Self::Severe => "Severe pain detected, stop the exercise",
        }
    }
}

impl fmt::Display for PainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Mild => "MILD",
            Self::Moderate => "MODERATE",
            Self::Severe => "SEVERE",
        };
        f.write_str(name)
    }
}

/// A recorded pain episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PainEvent {
    /// Episode start (ms)
    pub start_ms: u64,
    /// Episode length (ms)
    pub duration_ms: u64,
    /// Highest level seen during the episode
    pub level: PainLevel,
    /// Advice for the level
    pub message: String,
}

/// Result of one observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PainObservation {
    /// Level of this sample
    pub level: PainLevel,
    /// Whether the ongoing episode has lasted long enough to alert
    pub alert: bool,
    /// True only on the sample that first raised the alert for this episode
    pub alert_started: bool,
    /// Episode recorded by this sample, if it closed one
    pub event: Option<PainEvent>,
}

/// Aggregate of recorded pain episodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PainSummary {
    /// Number of episodes
    pub total_events: usize,
    /// Worst level across episodes
    pub max_level: PainLevel,
    /// Summed episode length (ms)
    pub total_duration_ms: u64,
}

impl PainSummary {
    /// Summarize a list of episodes
    #[must_use]
    pub fn from_events(events: &[PainEvent]) -> Self {
        Self {
            total_events: events.len(),
            max_level: events
                .iter()
                .map(|e| e.level)
                .max()
                .unwrap_or(PainLevel::None),
            total_duration_ms: events.iter().map(|e| e.duration_ms).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    start_ms: u64,
    max_level: PainLevel,
    alerted: bool,
}

/// Tracks pain episodes over a session
#[derive(Debug, Clone, Default)]
pub struct PainMonitor {
    config: PainConfig,
    episode: Option<Episode>,
    events: Vec<PainEvent>,
}

impl PainMonitor {
    /// Create a monitor
    #[must_use]
    pub const fn new(config: PainConfig) -> Self {
        Self {
            config,
            episode: None,
            events: Vec::new(),
        }
    }

    /// Feed one facial pain score
    pub fn observe(&mut self, score: f64, timestamp_ms: u64) -> PainObservation {
        let level = PainLevel::from_score(score, &self.config);

        if level == PainLevel::None {
            let event = self.close_episode(timestamp_ms);
            return PainObservation {
                level,
                alert: false,
                alert_started: false,
                event,
            };
        }

        let min_duration = self.config.min_event_duration_ms;
        let episode = self.episode.get_or_insert(Episode {
            start_ms: timestamp_ms,
            max_level: level,
            alerted: false,
        });
        episode.max_level = episode.max_level.max(level);
        let alert = timestamp_ms.saturating_sub(episode.start_ms) >= min_duration;
        let alert_started = alert && !episode.alerted;
        if alert_started {
            episode.alerted = true;
            warn!(level = %episode.max_level, "Sustained pain detected");
        }

        PainObservation {
            level,
            alert,
            alert_started,
            event: None,
        }
    }

    /// Close any open episode at `timestamp_ms`
    pub fn finish(&mut self, timestamp_ms: u64) -> Option<PainEvent> {
        self.close_episode(timestamp_ms)
    }

    /// Recorded episodes
    #[must_use]
    pub fn events(&self) -> &[PainEvent] {
        &self.events
    }

    /// Summary of recorded episodes
    #[must_use]
    pub fn summary(&self) -> PainSummary {
        PainSummary::from_events(&self.events)
    }

    fn close_episode(&mut self, timestamp_ms: u64) -> Option<PainEvent> {
        let episode = self.episode.take()?;
        let duration_ms = timestamp_ms.saturating_sub(episode.start_ms);
        if duration_ms < self.config.min_event_duration_ms {
            debug!(duration_ms, "Discarding short pain episode");
            return None;
        }
        let event = PainEvent {
            start_ms: episode.start_ms,
            duration_ms,
            level: episode.max_level,
            message: episode.max_level.message().to_owned(),
        };
        self.events.push(event.clone());
        Some(event)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_short_episode_is_discarded() {
        let mut monitor = PainMonitor::default();
        monitor.observe(50.0, 0);
        monitor.observe(50.0, 200);
        let closing = monitor.observe(0.0, 300);
        assert!(closing.event.is_none());
        assert_eq!(monitor.summary().total_events, 0);
    }

    #[test]
    fn test_episode_keeps_worst_level() {
        let mut monitor = PainMonitor::default();
        monitor.observe(25.0, 0);
        let severe = monitor.observe(80.0, 600);
        assert!(severe.alert);
        assert!(severe.alert_started);
        let again = monitor.observe(80.0, 700);
        assert!(again.alert);
        assert!(!again.alert_started);

        let closing = monitor.observe(5.0, 1000);
        let event = closing.event.unwrap();
        assert_eq!(event.level, PainLevel::Severe);
        assert_eq!(event.duration_ms, 1000);
    }
}
