//! Event source and credential store abstractions.
//!
//! An [`EventSource`] lists the raw events of one calendar for a time
//! window. A [`CredentialStore`] knows every authorized calendar and hands
//! out a ready-to-use source for each.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use calgauge_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;
use crate::token::TokenInfo;

/// A boxed future for async trait methods.
///
/// Keeps the traits object safe so the engine can hold `Arc<dyn ...>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists events of one calendar.
///
/// Implementations handle authentication and pagination internally and
/// return every event whose start lies in the window.
pub trait EventSource: Send + Sync {
    /// Fetches the raw events starting within `window`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on network errors, authentication failures, etc.
    fn list_events(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<RawEvent>>>;
}

/// A calendar id paired with the source that reads it.
#[derive(Clone)]
pub struct CalendarHandle {
    /// The calendar identifier (for Google, the account's primary calendar id).
    pub id: String,
    /// The source to fetch this calendar's events from.
    pub source: Arc<dyn EventSource>,
}

impl CalendarHandle {
    /// Creates a new handle.
    pub fn new(id: impl Into<String>, source: Arc<dyn EventSource>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

impl fmt::Debug for CalendarHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Durable mapping from calendar id to credential.
pub trait CredentialStore: Send + Sync {
    /// Returns a handle for every stored calendar, in id order.
    ///
    /// # Errors
    ///
    /// Fails as a whole only when the store itself cannot be read. A single
    /// calendar whose credential is unusable is still returned, with a
    /// source that reports the problem when fetched.
    fn enumerate(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarHandle>>>;

    /// Stores or replaces the credential for a calendar.
    fn upsert(&self, calendar: String, token: TokenInfo) -> BoxFuture<'_, ProviderResult<()>>;
}

/// A source that always fails with the same error.
///
/// Stands in for a calendar whose credential could not be made usable.
#[derive(Debug)]
pub struct ErrorSource {
    error: ProviderError,
}

impl ErrorSource {
    /// Creates a new error source.
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

impl EventSource for ErrorSource {
    fn list_events(&self, _window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<RawEvent>>> {
        let error = self.error.detached();
        Box::pin(async move { Err(error) })
    }
}

/// A source serving a fixed list of events.
///
/// Events are filtered to the requested window the way a remote API
/// would.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    events: Vec<RawEvent>,
}

impl StaticSource {
    /// Creates a source serving the given events.
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self { events }
    }
}

impl EventSource for StaticSource {
    fn list_events(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<RawEvent>>> {
        let events = self
            .events
            .iter()
            .filter(|e| starts_within(e, window))
            .cloned()
            .collect();
        Box::pin(async move { Ok(events) })
    }
}

// Events whose start cannot be read are passed through for normalization
// to deal with.
fn starts_within(event: &RawEvent, window: TimeWindow) -> bool {
    let Some(start) = event.start.as_ref().and_then(|s| s.date_time.as_deref()) else {
        return true;
    };
    match chrono::DateTime::parse_from_rfc3339(start) {
        Ok(dt) => window.contains(dt.with_timezone(&chrono::Utc)),
        Err(_) => true,
    }
}

/// An in-memory credential store with fixed sources.
///
/// Tokens passed to [`CredentialStore::upsert`] are recorded but sources are
/// registered explicitly with [`MemoryCredentialStore::insert`].
#[derive(Default)]
pub struct MemoryCredentialStore {
    sources: RwLock<BTreeMap<String, Arc<dyn EventSource>>>,
    tokens: RwLock<BTreeMap<String, TokenInfo>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source for a calendar, replacing any previous one.
    pub fn insert(&self, calendar: impl Into<String>, source: Arc<dyn EventSource>) {
        if let Ok(mut sources) = self.sources.write() {
            sources.insert(calendar.into(), source);
        }
    }

    /// Removes a calendar.
    pub fn remove(&self, calendar: &str) {
        if let Ok(mut sources) = self.sources.write() {
            sources.remove(calendar);
        }
    }

    /// Returns the token last upserted for a calendar.
    pub fn token(&self, calendar: &str) -> Option<TokenInfo> {
        self.tokens.read().ok()?.get(calendar).cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn enumerate(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarHandle>>> {
        let handles = self
            .sources
            .read()
            .map(|sources| {
                sources
                    .iter()
                    .map(|(id, source)| CalendarHandle::new(id, Arc::clone(source)))
                    .collect()
            })
            .map_err(|_| ProviderError::internal("credential store lock poisoned"));
        Box::pin(async move { handles })
    }

    fn upsert(&self, calendar: String, token: TokenInfo) -> BoxFuture<'_, ProviderResult<()>> {
        let result = self
            .tokens
            .write()
            .map(|mut tokens| {
                tokens.insert(calendar, token);
            })
            .map_err(|_| ProviderError::internal("credential store lock poisoned"));
        Box::pin(async move { result })
    }
}
