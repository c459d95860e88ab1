//! Event sources and credential stores for calgauge.
//!
//! - [`EventSource`] - lists one calendar's raw events for a time window
//! - [`CredentialStore`] - enumerates authorized calendars, stores new credentials
//! - [`RawEvent`] - provider data before interpretation
//! - [`normalize_event`] - turns a raw event into a core [`calgauge_core::Event`]
//! - [`ProviderError`] - error type for provider operations
//!
//! ```text
//!  FileCredentialStore ──enumerate──▶ CalendarHandle { id, source }
//!                                              │
//!                                   list_events(window)
//!                                              ▼
//!                                         Vec<RawEvent>
//!                                              │ normalize_events()
//!                                              ▼
//!                                       CalendarEvents
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod normalize;
pub mod raw_event;
pub mod source;
pub mod token;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::{NormalizeError, normalize_event, normalize_events};
pub use raw_event::{RawAttendee, RawEvent, RawEventTime};
pub use source::{
    BoxFuture, CalendarHandle, CredentialStore, ErrorSource, EventSource, MemoryCredentialStore,
    StaticSource,
};
pub use token::TokenInfo;
