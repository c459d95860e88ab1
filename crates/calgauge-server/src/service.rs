//! Background lifecycle: initial build, refresh loop, derivation loop.

use std::sync::Arc;

use calgauge_core::Snapshot;
use calgauge_providers::CredentialStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::builder::SnapshotBuilder;
use crate::config::ServerConfig;
use crate::derive::GaugeDeriver;
use crate::error::{ServerError, ServerResult};
use crate::metrics::GaugeSink;
use crate::scheduler::{RefreshHandle, RefreshScheduler};
use crate::signals::ShutdownHandle;

/// The running engine.
pub struct Service {
    refresh: RefreshHandle,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    scheduler_task: JoinHandle<()>,
    deriver_task: JoinHandle<()>,
}

impl Service {
    /// Builds the first snapshot, then starts both background loops.
    ///
    /// # Errors
    ///
    /// Fails without spawning anything if the first build fails.
    pub async fn start(
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn GaugeSink>,
        config: &ServerConfig,
        shutdown: ShutdownHandle,
    ) -> ServerResult<Self> {
        let builder = SnapshotBuilder::new(store, config.refresh.lookahead);
        let scheduler = RefreshScheduler::new(builder, config.refresh.clone());
        scheduler.initial_build().await?;

        let refresh = scheduler.handle();
        let snapshots = scheduler.subscribe();

        let deriver = GaugeDeriver::new(sink, &config.derive);
        let deriver_task = tokio::spawn(deriver.run(snapshots.clone(), shutdown.clone()));
        let scheduler_task = tokio::spawn(scheduler.run(shutdown));

        info!(
            calendars = snapshots.borrow().len(),
            "service started"
        );

        Ok(Self {
            refresh,
            snapshots,
            scheduler_task,
            deriver_task,
        })
    }

    /// Returns a handle for manual refreshes and state.
    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Subscribes to snapshot publications.
    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Waits for both loops to finish after shutdown.
    pub async fn wait(self) -> ServerResult<()> {
        let (scheduler, deriver) = tokio::join!(self.scheduler_task, self.deriver_task);
        scheduler.map_err(|e| ServerError::task(format!("refresh loop: {}", e)))?;
        deriver.map_err(|e| ServerError::task(format!("gauge derivation: {}", e)))?;
        debug!("service stopped");
        Ok(())
    }
}
