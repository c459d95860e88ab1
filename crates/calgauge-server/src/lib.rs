//! The calgauge engine.
//!
//! - [`SnapshotBuilder`] fetches every calendar's upcoming events
//! - [`RefreshScheduler`] rebuilds on a timer and on manual triggers
//! - [`GaugeDeriver`] turns the latest snapshot into gauges every second
//! - [`PrometheusGauges`] holds the gauges for scraping
//! - [`http`] serves `/metrics`, `/update`, `/auth` and `/healthz`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calgauge_providers::MemoryCredentialStore;
//! use calgauge_server::{AppState, PrometheusGauges, ServerConfig, Service, SignalHandler, http};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!
//!     let gauges = PrometheusGauges::new()?;
//!     let store = Arc::new(MemoryCredentialStore::new());
//!     let service =
//!         Service::start(store, Arc::new(gauges.clone()), &config, signals.shutdown_handle()).await?;
//!
//!     let listener = http::bind(config.listen).await?;
//!     let state = AppState::new(gauges, service.refresh_handle());
//!     http::serve(listener, state, signals.shutdown_handle()).await?;
//!     service.wait().await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod derive;
mod error;
pub mod http;
mod metrics;
mod scheduler;
mod service;
mod signals;

pub use builder::{BuildOutcome, CalendarFailure, SnapshotBuilder};
pub use config::{DeriveConfig, RefreshConfig, ServerConfig};
pub use derive::{GaugeDeriver, NextEvents, next_by_kind};
pub use error::{ServerError, ServerResult};
pub use http::{AppState, AuthFlow, HttpError};
pub use metrics::{GaugeMetric, GaugeSink, PrometheusGauges};
pub use scheduler::{
    RefreshCause, RefreshHandle, RefreshScheduler, SchedulerState, SharedSchedulerState,
    TriggerOutcome,
};
pub use service::Service;
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
