//! Snapshot construction.
//!
//! One build enumerates every stored calendar, fetches each one's events
//! for the lookahead window concurrently, and normalizes the results into
//! a fresh [`Snapshot`]. A calendar whose fetch fails is left out of the
//! snapshot and reported in [`BuildOutcome::failures`]; the build as a
//! whole only fails when the credential store cannot be enumerated.

use std::collections::BTreeMap;
use std::sync::Arc;

use calgauge_core::{Snapshot, TimeWindow};
use calgauge_providers::{CredentialStore, ProviderError, normalize_events};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::ServerResult;

/// A calendar that could not be fetched during a build.
#[derive(Debug)]
pub struct CalendarFailure {
    /// The calendar id.
    pub calendar: String,
    /// Why the fetch failed.
    pub error: ProviderError,
}

/// The result of one build: the snapshot plus per-calendar failures.
#[derive(Debug)]
pub struct BuildOutcome {
    /// The freshly built snapshot. Failed calendars are absent.
    pub snapshot: Snapshot,
    /// Calendars omitted from the snapshot.
    pub failures: Vec<CalendarFailure>,
}

impl BuildOutcome {
    /// Returns true if every calendar was fetched.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of the calendars that failed, in order.
    pub fn failed_calendars(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.calendar.clone()).collect()
    }
}

/// Builds snapshots from a credential store.
#[derive(Clone)]
pub struct SnapshotBuilder {
    store: Arc<dyn CredentialStore>,
    lookahead: chrono::Duration,
}

impl SnapshotBuilder {
    /// Creates a builder reading `store` over `lookahead`.
    pub fn new(store: Arc<dyn CredentialStore>, lookahead: chrono::Duration) -> Self {
        Self { store, lookahead }
    }

    /// Returns the lookahead window length.
    pub fn lookahead(&self) -> chrono::Duration {
        self.lookahead
    }

    /// Builds a snapshot covering `[now, now + lookahead)`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the credential store cannot be
    /// enumerated. Per-calendar errors are carried in the outcome.
    pub async fn build(&self, now: DateTime<Utc>) -> ServerResult<BuildOutcome> {
        let handles = self.store.enumerate().await?;
        let window = TimeWindow::lookahead(now, self.lookahead);
        debug!(calendars = handles.len(), "building snapshot");

        let fetches = handles.into_iter().map(|handle| async move {
            let result = handle.source.list_events(window).await;
            (handle.id, result)
        });

        let mut calendars = BTreeMap::new();
        let mut failures = Vec::new();

        for (id, result) in join_all(fetches).await {
            match result {
                Ok(raw) => {
                    let events = normalize_events(&id, &raw);
                    debug!(calendar = %id, events = events.len(), "fetched calendar");
                    calendars.insert(id, events);
                }
                Err(error) => {
                    warn!(calendar = %id, error = %error, "failed to fetch calendar");
                    failures.push(CalendarFailure {
                        calendar: id,
                        error,
                    });
                }
            }
        }

        Ok(BuildOutcome {
            snapshot: Snapshot::new(now, calendars),
            failures,
        })
    }
}
