// ABOUTME: Background pain-signal worker fed through a bounded non-blocking queue
// ABOUTME: Drops the newest sample when the queue is full so frame processing never waits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! # Pain Worker
//!
//! Facial pain scores arrive on a different channel than joint angles and may
//! be slower to produce. The frame loop hands them to a tokio task through a
//! bounded `mpsc` queue with `try_send`: when the queue is full the newest
//! sample is dropped and counted. Recorded episodes are published to a shared
//! buffer the engine drains without blocking, and the alert state of the
//! latest processed sample is published through an atomic flag.

use crate::errors::{AppError, AppResult};
use crate::events::{SessionEvent, SessionEventSink};
use crate::intelligence::config::PainConfig;
use crate::intelligence::{PainEvent, PainMonitor, PainSummary};
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// One facial pain score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PainSample {
    /// Facial pain score (0-100)
    pub score: f64,
    /// Capture time (ms)
    pub timestamp_ms: u64,
}

/// What happened to a submitted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Queued for the worker
    Accepted,
    /// The queue was full; the sample was discarded
    DroppedFull,
    /// The worker has stopped
    Closed,
}

/// Spawns pain workers
pub struct PainWorker;

impl PainWorker {
    /// Start a worker task on the current tokio runtime
    #[must_use]
    pub fn spawn(
        config: PainConfig,
        sink: Arc<dyn SessionEventSink>,
        session_id: Uuid,
    ) -> PainWorkerHandle {
        let (sender, mut receiver) = mpsc::channel::<PainSample>(config.queue_capacity.max(1));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let published = Arc::clone(&recorded);
        let alerting = Arc::new(AtomicBool::new(false));
        let alert_flag = Arc::clone(&alerting);

        let task = tokio::spawn(async move {
            let mut monitor = PainMonitor::new(config);
            let mut last_timestamp_ms = 0;
            while let Some(sample) = receiver.recv().await {
                last_timestamp_ms = sample.timestamp_ms;
                let observation = monitor.observe(sample.score, sample.timestamp_ms);
                if observation.alert_started {
                    sink.record(&SessionEvent::PainWarning {
                        session_id,
                        level: observation.level,
                        timestamp_ms: sample.timestamp_ms,
                    });
                }
                alert_flag.store(observation.alert, Ordering::Release);
                if let Some(event) = observation.event {
                    publish(&published, event);
                }
            }
            if let Some(event) = monitor.finish(last_timestamp_ms) {
                publish(&published, event);
            }
            alert_flag.store(false, Ordering::Release);
            debug!(session.id = %session_id, "Pain worker stopped");
            monitor.summary()
        });

        PainWorkerHandle {
            sender: Some(sender),
            task,
            recorded,
            alerting,
            dropped: Arc::new(AtomicU64::new(0)),
            session_id,
        }
    }
}

fn publish(buffer: &Mutex<Vec<PainEvent>>, event: PainEvent) {
    buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(event);
}

/// Producer side of a running pain worker
#[derive(Debug)]
pub struct PainWorkerHandle {
    sender: Option<mpsc::Sender<PainSample>>,
    task: JoinHandle<PainSummary>,
    recorded: Arc<Mutex<Vec<PainEvent>>>,
    alerting: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    session_id: Uuid,
}

impl PainWorkerHandle {
    /// Enqueue without waiting
    pub fn submit(&self, sample: PainSample) -> EnqueueOutcome {
        let Some(sender) = &self.sender else {
            return EnqueueOutcome::Closed;
        };
        match sender.try_send(sample) {
            Ok(()) => EnqueueOutcome::Accepted,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(session.id = %self.session_id, dropped, "Pain queue full, sample dropped");
                EnqueueOutcome::DroppedFull
            }
            Err(TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Samples discarded because the queue was full
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the latest processed sample belongs to a sustained episode
    #[must_use]
    pub fn is_alerting(&self) -> bool {
        self.alerting.load(Ordering::Acquire)
    }

    /// Take the episodes recorded since the last call
    #[must_use]
    pub fn drain_events(&self) -> Vec<PainEvent> {
        mem::take(&mut *self.recorded.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Close the queue, let the worker finish the backlog and return its summary
    ///
    /// # Errors
    ///
    /// Returns `INTERNAL_ERROR` if the worker task panicked or was cancelled
    pub async fn shutdown(mut self) -> AppResult<PainSummary> {
        drop(self.sender.take());
        let session_id = self.session_id;
        self.task.await.map_err(|e| {
            AppError::internal(format!("Pain worker failed: {e}")).with_session_id(session_id)
        })
    }
}
