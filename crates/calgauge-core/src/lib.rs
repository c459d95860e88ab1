//! Core types: events, snapshots, gauge keys, time windows, tracing

pub mod event;
pub mod gauge;
pub mod snapshot;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvents, Event};
pub use gauge::{GaugeKey, GaugeKind};
pub use snapshot::Snapshot;
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
