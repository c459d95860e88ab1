//! Refresh scheduler.
//!
//! The scheduler owns the current [`Snapshot`] and replaces it whenever a
//! build succeeds. Builds are triggered by:
//! - a fixed-interval timer (first tick one full interval after start)
//! - manual triggers sent through a [`RefreshHandle`]
//!
//! Snapshots are published through a `watch` channel as `Arc<Snapshot>`, so
//! readers always hold one complete snapshot and never wait on a build.
//!
//! Manual triggers go through a bounded queue. Each queued trigger causes
//! one build; once the queue is full further triggers are dropped and the
//! caller is told so.

use std::sync::Arc;

use calgauge_core::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::builder::SnapshotBuilder;
use crate::config::RefreshConfig;
use crate::error::ServerResult;
use crate::signals::ShutdownHandle;

/// What caused a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCause {
    /// The process started.
    Startup,
    /// The refresh timer fired.
    Timer,
    /// A manual trigger was dequeued.
    Manual,
}

/// Result of a manual trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The trigger was queued and will cause one build.
    Queued,
    /// The queue was full; the trigger was dropped.
    Dropped,
    /// The scheduler has stopped.
    Closed,
}

/// Scheduler bookkeeping, exposed for health reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerState {
    /// Number of completed build attempts.
    pub builds: u64,
    /// Number of consecutive build-wide failures.
    pub consecutive_failures: u32,
    /// Last successful build time.
    pub last_success: Option<DateTime<Utc>>,
    /// Last build attempt time.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last build-wide error message.
    pub last_error: Option<String>,
    /// What caused the last attempt.
    pub last_cause: Option<RefreshCause>,
    /// Calendars in the current snapshot.
    pub calendars: usize,
    /// Calendars that failed in the last successful build.
    pub failed_calendars: Vec<String>,
}

impl SchedulerState {
    /// Creates a new scheduler state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful build.
    pub fn record_success(
        &mut self,
        at: DateTime<Utc>,
        cause: RefreshCause,
        calendars: usize,
        failed_calendars: Vec<String>,
    ) {
        self.builds += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        self.last_attempt = Some(at);
        self.last_error = None;
        self.last_cause = Some(cause);
        self.calendars = calendars;
        self.failed_calendars = failed_calendars;
    }

    /// Records a failed build.
    pub fn record_failure(&mut self, at: DateTime<Utc>, cause: RefreshCause, error: impl Into<String>) {
        self.builds += 1;
        self.consecutive_failures += 1;
        self.last_attempt = Some(at);
        self.last_error = Some(error.into());
        self.last_cause = Some(cause);
    }

    /// Returns true if at least one build has succeeded.
    pub fn is_ready(&self) -> bool {
        self.last_success.is_some()
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// The refresh scheduler.
pub struct RefreshScheduler {
    builder: SnapshotBuilder,
    config: RefreshConfig,
    state: SharedSchedulerState,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

impl RefreshScheduler {
    /// Creates a scheduler. Readers see an empty snapshot until the first
    /// build succeeds.
    pub fn new(builder: SnapshotBuilder, config: RefreshConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (trigger_tx, trigger_rx) = mpsc::channel(config.manual_queue_capacity.max(1));
        Self {
            builder,
            config,
            state: Arc::new(RwLock::new(SchedulerState::new())),
            snapshot_tx,
            trigger_tx,
            trigger_rx,
        }
    }

    /// Returns a handle for triggering refreshes and reading state.
    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            trigger_tx: self.trigger_tx.clone(),
            state: Arc::clone(&self.state),
            snapshot_rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Subscribes to snapshot publications.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Runs the startup build.
    ///
    /// # Errors
    ///
    /// Unlike later builds, a build-wide failure here is returned so the
    /// process can refuse to start without data.
    pub async fn initial_build(&self) -> ServerResult<()> {
        self.refresh(RefreshCause::Startup).await
    }

    /// Runs until shutdown, serving timer ticks and manual triggers.
    pub async fn run(mut self, shutdown: ShutdownHandle) {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            queue_capacity = self.config.manual_queue_capacity,
            "refresh scheduler started"
        );

        let stop = shutdown.wait().wait();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => self.refresh_or_abandon(RefreshCause::Timer, &shutdown).await,
                Some(()) = self.trigger_rx.recv() => {
                    self.refresh_or_abandon(RefreshCause::Manual, &shutdown).await
                }
            }

            if shutdown.is_shutdown() {
                break;
            }
        }

        self.trigger_rx.close();
        info!("refresh scheduler stopped");
    }

    async fn refresh_or_abandon(&self, cause: RefreshCause, shutdown: &ShutdownHandle) {
        tokio::select! {
            _ = self.refresh(cause) => {}
            _ = shutdown.wait().wait() => debug!(?cause, "abandoning refresh for shutdown"),
        }
    }

    /// Builds and, on success, publishes a new snapshot.
    async fn refresh(&self, cause: RefreshCause) -> ServerResult<()> {
        let now = Utc::now();
        debug!(?cause, "refreshing snapshot");

        match self.builder.build(now).await {
            Ok(outcome) => {
                let failed = outcome.failed_calendars();
                let calendars = outcome.snapshot.len();
                info!(
                    ?cause,
                    calendars,
                    events = outcome.snapshot.event_count(),
                    failed = failed.len(),
                    "snapshot refreshed"
                );
                self.snapshot_tx.send_replace(Arc::new(outcome.snapshot));
                self.state
                    .write()
                    .await
                    .record_success(now, cause, calendars, failed);
                Ok(())
            }
            Err(e) => {
                if cause == RefreshCause::Startup {
                    error!(error = %e, "initial snapshot build failed");
                } else {
                    warn!(?cause, error = %e, "snapshot refresh failed, keeping previous snapshot");
                }
                self.state
                    .write()
                    .await
                    .record_failure(now, cause, e.to_string());
                Err(e)
            }
        }
    }
}

/// Handle for triggering refreshes and reading scheduler state.
#[derive(Clone, Debug)]
pub struct RefreshHandle {
    trigger_tx: mpsc::Sender<()>,
    state: SharedSchedulerState,
    snapshot_rx: watch::Receiver<Arc<Snapshot>>,
}

impl RefreshHandle {
    /// Enqueues a manual refresh without waiting.
    pub fn trigger(&self) -> TriggerOutcome {
        match self.trigger_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!("manual refresh queue full, dropping trigger");
                TriggerOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Closed,
        }
    }

    /// Returns a copy of the scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    /// Returns the currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }
}
