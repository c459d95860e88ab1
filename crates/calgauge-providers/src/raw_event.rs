//! Raw event type from event sources.
//!
//! [`RawEvent`] mirrors what a calendar backend hands back before any
//! interpretation. Timestamps are kept as the provider's strings so that
//! [`crate::normalize`] is the single place that parses them.

use serde::{Deserialize, Serialize};

/// The start or end of a raw event.
///
/// Google reports timed events through `dateTime` (RFC 3339) and all-day
/// events through `date` (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    /// RFC 3339 timestamp for timed events.
    #[serde(default)]
    pub date_time: Option<String>,
    /// Calendar date for all-day events.
    #[serde(default)]
    pub date: Option<String>,
}

impl RawEventTime {
    /// A timed event boundary.
    pub fn date_time(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            date: None,
        }
    }

    /// An all-day event boundary.
    pub fn date(value: impl Into<String>) -> Self {
        Self {
            date_time: None,
            date: Some(value.into()),
        }
    }

    /// Returns true if this is an all-day boundary.
    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }
}

/// An attendee of a raw event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendee {
    /// The attendee's email address. Resources sometimes come without one.
    #[serde(default)]
    pub email: Option<String>,
    /// Whether this entry is the authenticated calendar owner.
    #[serde(default, rename = "self")]
    pub is_self: bool,
    /// The attendee's response status, as reported.
    #[serde(default)]
    pub response_status: Option<String>,
}

impl RawAttendee {
    /// Creates an attendee with the given email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Marks this attendee as the calendar owner.
    pub fn as_self(mut self) -> Self {
        self.is_self = true;
        self
    }
}

/// A raw calendar event as returned by an event source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Identifier of the event within its calendar.
    #[serde(default)]
    pub id: String,
    /// The event title.
    #[serde(default)]
    pub summary: Option<String>,
    /// When the event starts. Missing for some malformed entries.
    #[serde(default)]
    pub start: Option<RawEventTime>,
    /// When the event ends.
    #[serde(default)]
    pub end: Option<RawEventTime>,
    /// The event status (`confirmed`, `tentative`, `cancelled`).
    #[serde(default)]
    pub status: Option<String>,
    /// Everyone invited, possibly including the owner.
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
}

impl RawEvent {
    /// Creates a timed event starting at the given RFC 3339 timestamp.
    pub fn new(id: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: Some(RawEventTime::date_time(start)),
            ..Self::default()
        }
    }

    /// Builder method to set the title.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start boundary.
    pub fn with_start(mut self, start: RawEventTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the end boundary.
    pub fn with_end(mut self, end: RawEventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Builder method to add an attendee.
    pub fn with_attendee(mut self, attendee: RawAttendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    /// Returns the title, falling back to "(No title)" if empty.
    pub fn effective_title(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("(No title)")
    }

    /// Returns true if the event was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}
