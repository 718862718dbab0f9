//! Interval scheduler for the scrape pipeline.
//!
//! One cycle at a time per process: the run-lock is an in-memory atomic flag,
//! so separate processes sharing a data directory can still overlap.
//! Scheduler state lives in memory only and resets on restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::collectors::SourceFailure;
use crate::collectors::runner::Pipeline;
use crate::error::SchedulerError;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    Stopped,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// Recorded outcome of one cycle, successful or not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub success: bool,
    pub trigger: Trigger,
    pub record_count: usize,
    pub snapshot: Option<String>,
    pub error: Option<String>,
    pub failed_sources: Vec<SourceFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of a manual trigger. `Busy` is expected, not a fault.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Completed(CycleResult),
    Busy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigUpdate {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub state: SchedulerPhase,
    pub enabled: bool,
    pub interval_secs: u64,
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<CycleResult>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
}

struct State {
    enabled: bool,
    interval: Duration,
    last_run_at: Option<DateTime<Utc>>,
    last_result: Option<CycleResult>,
    next_run_at: Option<DateTime<Utc>>,
    /// Present while the interval loop is armed.
    shutdown: Option<watch::Sender<bool>>,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    state: Mutex<State>,
}

/// Holds the run-lock; releases it on drop. Owned so it can move into a
/// spawned cycle task.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    /// `interval` is clamped to `1s..=MAX_INTERVAL`.
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        let clamped = interval.clamp(Duration::from_secs(1), MAX_INTERVAL);
        if clamped != interval {
            tracing::warn!(
                "Scrape interval {}s out of range, using {}s",
                interval.as_secs(),
                clamped.as_secs()
            );
        }
        Self {
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(State {
                enabled: false,
                interval: clamped,
                last_run_at: None,
                last_result: None,
                next_run_at: None,
                shutdown: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.is_running() {
            SchedulerPhase::Running
        } else if self.state().shutdown.is_some() {
            SchedulerPhase::Scheduled
        } else {
            SchedulerPhase::Stopped
        }
    }

    /// Arm the interval timer. Returns false when it was already armed.
    pub fn start(self: &Arc<Self>) -> bool {
        let rx = {
            let mut state = self.state();
            if state.shutdown.is_some() {
                tracing::debug!("Scheduler already started");
                return false;
            }
            let (tx, rx) = watch::channel(false);
            state.shutdown = Some(tx);
            state.enabled = true;
            rx
        };

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_loop(rx).await });
        true
    }

    /// Disarm the timer. A cycle already in flight runs to completion.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        state.enabled = false;
        state.next_run_at = None;
        match state.shutdown.take() {
            Some(tx) => {
                let _ = tx.send(true);
                tracing::info!("Scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Run one cycle now, unless one is already running. The cycle runs on
    /// its own task, so dropping this future does not cancel it and the
    /// result is still recorded.
    pub async fn trigger_manual_scraping(self: &Arc<Self>) -> TriggerOutcome {
        let Some(guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("Manual scrape rejected: a cycle is already running");
            return TriggerOutcome::Busy;
        };

        let this = Arc::clone(self);
        let started_at = Utc::now();
        match tokio::spawn(async move { this.run_locked(guard, Trigger::Manual).await }).await {
            Ok(result) => TriggerOutcome::Completed(result),
            Err(e) => {
                tracing::error!("Manual scrape task failed: {e}");
                let result = CycleResult {
                    success: false,
                    trigger: Trigger::Manual,
                    record_count: 0,
                    snapshot: None,
                    error: Some(format!("scrape task failed: {e}")),
                    failed_sources: Vec::new(),
                    started_at,
                    finished_at: Utc::now(),
                };
                self.record(&result);
                TriggerOutcome::Completed(result)
            }
        }
    }

    /// Merge new settings. An interval change applies from the next tick.
    pub fn update_config(
        self: &Arc<Self>,
        update: SchedulerConfigUpdate,
    ) -> Result<SchedulerStatus, SchedulerError> {
        if let Some(secs) = update.interval_secs {
            let interval = Duration::from_secs(secs);
            if secs == 0 || interval > MAX_INTERVAL {
                return Err(SchedulerError::InvalidInterval);
            }
            self.state().interval = interval;
            tracing::info!("Scheduler interval set to {secs}s");
        }
        match update.enabled {
            Some(true) => {
                self.start();
            }
            Some(false) => {
                self.stop();
            }
            None => {}
        }
        Ok(self.status())
    }

    pub fn status(&self) -> SchedulerStatus {
        let phase = self.phase();
        let state = self.state();
        SchedulerStatus {
            state: phase,
            enabled: state.enabled,
            interval_secs: state.interval.as_secs(),
            running: phase == SchedulerPhase::Running,
            last_run_at: state.last_run_at,
            last_result: state.last_result.clone(),
            next_run_at: state.next_run_at,
            sources: self.pipeline.source_names(),
        }
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Scheduler started");
        loop {
            let interval = {
                let mut state = self.state();
                state.next_run_at = TimeDelta::from_std(state.interval)
                    .ok()
                    .and_then(|d| Utc::now().checked_add_signed(d));
                state.interval
            };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            if self.try_run(Trigger::Scheduled).await.is_none() {
                tracing::warn!("Skipping scheduled scrape: previous cycle still running");
            }
            if *shutdown.borrow() {
                break;
            }
        }
        tracing::debug!("Scheduler loop exited");
    }

    async fn try_run(&self, trigger: Trigger) -> Option<CycleResult> {
        let guard = RunGuard::acquire(&self.running)?;
        Some(self.run_locked(guard, trigger).await)
    }

    /// Run one cycle while holding the run-lock and record its result.
    async fn run_locked(&self, _guard: RunGuard, trigger: Trigger) -> CycleResult {
        let started_at = Utc::now();

        let result = match self.pipeline.run_cycle().await {
            Ok(summary) => CycleResult {
                success: true,
                trigger,
                record_count: summary.jobs_saved,
                snapshot: Some(summary.snapshot),
                error: None,
                failed_sources: summary.failed_sources,
                started_at,
                finished_at: summary.finished_at,
            },
            Err(e) => {
                tracing::error!("Scrape cycle failed: {e}");
                CycleResult {
                    success: false,
                    trigger,
                    record_count: 0,
                    snapshot: None,
                    error: Some(e.to_string()),
                    failed_sources: Vec::new(),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
        };

        self.record(&result);
        result
    }

    fn record(&self, result: &CycleResult) {
        let mut state = self.state();
        state.last_run_at = Some(result.started_at);
        state.last_result = Some(result.clone());
    }
}
