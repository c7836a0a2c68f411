//! The monitoring engine: periodic probing, state transitions, notifications.
//!
//! One probe cycle runs at a time. Every cycle persists its outcome before
//! any notification goes out, so a crash can lose at most the cycle in
//! flight and never announces slots it did not record.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

use crate::dispatch::Dispatcher;
use crate::dispatch::NotificationEvent;
use crate::model::MonitorStateModel;
use crate::model::ProbeStatus;
use crate::probe::ProbeReport;
use crate::probe::Prober;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;

pub const MIN_INTERVAL_SECS: u64 = 30;
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Consecutive probe errors before subscribers hear about it, once.
const ERROR_ALERT_THRESHOLD: i64 = 3;

/// Consecutive persistence failures before the monitor stops itself.
const PERSIST_FAILURE_LIMIT: u32 = 3;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MonitorError {
    #[error("Interval must be between {} and {} seconds, got {got}.", MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)]
    IntervalOutOfBounds { got: u64 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { interval: Duration },
    /// The loop was already running; only the interval was updated.
    AlreadyRunning { interval: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Snapshot of the monitor for display.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub running: bool,
    pub interval: Duration,
    pub last_status: Option<ProbeStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_detail: Option<String>,
    pub last_evidence_path: Option<String>,
    pub consecutive_errors: i64,
}

/// Drives probe cycles on a timer and decides what they mean.
pub struct SlotMonitor {
    db: Arc<Repository>,
    prober: Arc<dyn Prober>,
    dispatcher: Arc<Dispatcher>,
    target_url: String,
    state: Mutex<MonitorStateModel>,
    /// Held for the whole of a probe cycle. Ticks that arrive while a cycle
    /// runs are skipped, never queued.
    cycle_guard: Mutex<()>,
    running: AtomicBool,
    shutdown: AtomicBool,
    wake: Notify,
    persist_failures: AtomicU32,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SlotMonitor {
    /// Loads persisted state (or seeds it) and builds the monitor, stopped.
    pub async fn new(
        db: Arc<Repository>,
        prober: Arc<dyn Prober>,
        dispatcher: Arc<Dispatcher>,
        target_url: &str,
        default_interval: Duration,
    ) -> Result<Arc<Self>, MonitorError> {
        let state = match db.monitor_state.load().await? {
            Some(mut state) => {
                if Self::validate_interval(state.interval_seconds as u64).is_err() {
                    warn!(
                        "Saved interval {}s is out of bounds, falling back to {:?}.",
                        state.interval_seconds, default_interval
                    );
                    state.interval_seconds = default_interval.as_secs() as i64;
                }
                state
            }
            None => {
                let state = MonitorStateModel::initial(default_interval.as_secs() as i64);
                db.monitor_state.save(&state).await?;
                state
            }
        };

        info!("Initializing SlotMonitor with interval {}s.", state.interval_seconds);

        Ok(Arc::new(Self {
            db,
            prober,
            dispatcher,
            target_url: target_url.to_string(),
            state: Mutex::new(state),
            cycle_guard: Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            wake: Notify::new(),
            persist_failures: AtomicU32::new(0),
            loop_handle: Mutex::new(None),
        }))
    }

    /// Resumes the probe loop when the saved state says monitoring was on.
    ///
    /// Returns whether monitoring resumed.
    pub async fn restore(self: &Arc<Self>) -> bool {
        let resume = self.state.lock().await.running;
        if resume {
            self.running.store(true, Ordering::SeqCst);
            info!("Resuming monitoring from saved state.");
            self.spawn_loop().await;
        }
        resume
    }

    /// Starts monitoring, or updates the interval when already running.
    ///
    /// The new state is persisted before the loop is touched. On a failed
    /// save nothing changes.
    pub async fn start(self: &Arc<Self>, interval_secs: Option<u64>) -> Result<StartOutcome, MonitorError> {
        let mut state = self.state.lock().await;

        let interval_seconds = match interval_secs {
            Some(secs) => {
                Self::validate_interval(secs)?;
                secs as i64
            }
            None => state.interval_seconds,
        };

        let was_running = state.running;
        let previous_interval = state.interval_seconds;
        state.interval_seconds = interval_seconds;
        state.running = true;

        if let Err(e) = self.db.monitor_state.save(&state).await {
            state.interval_seconds = previous_interval;
            state.running = was_running;
            return Err(e.into());
        }

        let interval = Duration::from_secs(interval_seconds as u64);
        drop(state);

        if was_running {
            self.wake.notify_one();
            return Ok(StartOutcome::AlreadyRunning { interval });
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Starting monitor loop with interval {interval:?}.");
        self.spawn_loop().await;
        Ok(StartOutcome::Started { interval })
    }

    /// Stops monitoring. A probe already in flight finishes and is recorded.
    pub async fn stop(&self) -> Result<StopOutcome, MonitorError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(StopOutcome::NotRunning);
        }

        state.running = false;
        if let Err(e) = self.db.monitor_state.save(&state).await {
            state.running = true;
            return Err(e.into());
        }
        drop(state);

        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        info!("Monitor stopped.");
        Ok(StopOutcome::Stopped)
    }

    /// Changes the probe cadence. Takes effect at the next loop turn, without
    /// an extra immediate probe.
    pub async fn set_interval(&self, interval_secs: u64) -> Result<Duration, MonitorError> {
        Self::validate_interval(interval_secs)?;

        let mut state = self.state.lock().await;
        let previous = state.interval_seconds;
        state.interval_seconds = interval_secs as i64;
        if let Err(e) = self.db.monitor_state.save(&state).await {
            state.interval_seconds = previous;
            return Err(e.into());
        }
        drop(state);

        self.wake.notify_one();
        info!("Monitor interval set to {interval_secs}s.");
        Ok(Duration::from_secs(interval_secs))
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        MonitorStatus {
            running: state.running,
            interval: Duration::from_secs(state.interval_seconds as u64),
            last_status: state.last_status,
            last_checked_at: state.last_checked_at,
            last_detail: state.last_detail.clone(),
            last_evidence_path: state.last_evidence_path.clone(),
            consecutive_errors: state.consecutive_errors,
        }
    }

    /// Ends the loop for process exit, leaving the persisted running flag
    /// as-is so the next start resumes monitoring. Waits for an in-flight
    /// probe to finish.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("Monitor loop ended abnormally: {e}");
        }
        info!("Monitor shut down.");
    }

    async fn spawn_loop(self: &Arc<Self>) {
        let monitor = self.clone();
        let handle = tokio::spawn(async move { monitor.run_loop().await });
        *self.loop_handle.lock().await = Some(handle);
    }

    async fn run_loop(self: Arc<Self>) {
        let mut period = self.interval().await;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.should_stop() {
                        break;
                    }
                    self.run_cycle().await;
                }
                _ = self.wake.notified() => {
                    if self.should_stop() {
                        break;
                    }
                }
            }

            let current = self.interval().await;
            if current != period {
                period = current;
                // A cadence change waits out one full new period instead of
                // probing immediately.
                ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
        }
        info!("Monitor loop exited.");
    }

    async fn run_cycle(&self) {
        let _cycle = self.cycle_guard.lock().await;
        if self.should_stop() {
            return;
        }

        debug!("Probing for available slots.");
        let report = self.prober.probe().await;
        debug!("Probe finished: {} ({}).", report.status, report.detail);

        let mut state = self.state.lock().await;
        let previous_status = state.last_status;
        let previous_errors = state.consecutive_errors;

        state.last_status = Some(report.status);
        state.last_checked_at = Some(report.checked_at);
        state.last_detail = Some(report.detail.clone());
        state.last_evidence_path = report
            .evidence_path
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        state.consecutive_errors = if report.status == ProbeStatus::Error {
            previous_errors + 1
        } else {
            0
        };

        let event = Self::decide_event(previous_status, previous_errors, &report, &self.target_url);

        let saved = self.db.monitor_state.save(&state).await;
        drop(state);

        match saved {
            Ok(()) => {
                self.persist_failures.store(0, Ordering::SeqCst);
                if let Some(event) = event {
                    self.spawn_dispatch(event);
                }
            }
            Err(e) => {
                let failures = self.persist_failures.fetch_add(1, Ordering::SeqCst) + 1;
                error!("Failed to persist monitor state ({failures} in a row): {e}");
                if event.is_some() {
                    warn!("Suppressing notification for this check; its state was not persisted.");
                }
                if failures >= PERSIST_FAILURE_LIMIT {
                    error!("Stopping monitor after {failures} consecutive persistence failures.");
                    self.force_stop().await;
                }
            }
        }
    }

    /// What a finished probe means for subscribers, if anything.
    ///
    /// Slots fire on the edge into available, not on every available check.
    /// Degradation fires exactly when the error streak reaches the threshold.
    fn decide_event(
        previous_status: Option<ProbeStatus>,
        previous_errors: i64,
        report: &ProbeReport,
        target_url: &str,
    ) -> Option<NotificationEvent> {
        match report.status {
            ProbeStatus::Available if previous_status != Some(ProbeStatus::Available) => {
                Some(NotificationEvent::SlotsAvailable {
                    checked_at: report.checked_at,
                    detail: report.detail.clone(),
                    target_url: target_url.to_string(),
                })
            }
            ProbeStatus::Error if previous_errors + 1 == ERROR_ALERT_THRESHOLD => {
                Some(NotificationEvent::MonitorDegraded {
                    consecutive_errors: previous_errors + 1,
                    detail: report.detail.clone(),
                })
            }
            _ => None,
        }
    }

    fn spawn_dispatch(&self, event: NotificationEvent) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(&event).await {
                error!("Failed to dispatch notification: {e}");
            }
        });
    }

    async fn force_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.running = false;
        if let Err(e) = self.db.monitor_state.save(&state).await {
            warn!("Could not persist the stopped state: {e}");
        }
        drop(state);
        self.wake.notify_one();
    }

    async fn interval(&self) -> Duration {
        Duration::from_secs(self.state.lock().await.interval_seconds as u64)
    }

    fn should_stop(&self) -> bool {
        !self.running.load(Ordering::SeqCst) || self.shutdown.load(Ordering::SeqCst)
    }

    fn validate_interval(secs: u64) -> Result<(), MonitorError> {
        if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
            Ok(())
        } else {
            Err(MonitorError::IntervalOutOfBounds { got: secs })
        }
    }
}
