//! RawEvent to Event conversion.
//!
//! Every timestamp a provider sends is parsed here, so a malformed entry is
//! rejected while the snapshot is built and never reaches gauge derivation.

use calgauge_core::{CalendarEvents, Event};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::raw_event::{RawEvent, RawEventTime};

/// An event carried a timestamp that is not valid RFC 3339.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("event {event_id}: invalid {field} timestamp '{value}': {source}")]
    InvalidTimestamp {
        event_id: String,
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Converts a [`RawEvent`] into an [`Event`].
///
/// Returns `Ok(None)` for entries that never produce a gauge: cancelled
/// events and events without a timed start (all-day or missing). The
/// calendar owner and attendees without an email are left out of the
/// attendee set.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidTimestamp`] when a present `dateTime`
/// does not parse.
pub fn normalize_event(raw: &RawEvent) -> Result<Option<Event>, NormalizeError> {
    if raw.is_cancelled() {
        return Ok(None);
    }

    let Some(starts) = parse_boundary(raw, raw.start.as_ref(), "start")? else {
        return Ok(None);
    };
    let ends = parse_boundary(raw, raw.end.as_ref(), "end")?;

    let mut event = Event::new(raw.effective_title(), starts);
    event.ends = ends;
    event.attendees = raw
        .attendees
        .iter()
        .filter(|a| !a.is_self)
        .filter_map(|a| a.email.as_deref())
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Some(event))
}

/// Normalizes a batch of raw events into a calendar's ordered list.
///
/// Events that fail to parse are logged and skipped; the rest of the
/// calendar is kept.
pub fn normalize_events(calendar: &str, raw_events: &[RawEvent]) -> CalendarEvents {
    let mut events = CalendarEvents::new();
    for raw in raw_events {
        match normalize_event(raw) {
            Ok(Some(event)) => events.insert(event),
            Ok(None) => {}
            Err(e) => warn!(calendar = %calendar, error = %e, "dropping malformed event"),
        }
    }
    events
}

fn parse_boundary(
    raw: &RawEvent,
    time: Option<&RawEventTime>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    let Some(value) = time.and_then(|t| t.date_time.as_deref()) else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|source| NormalizeError::InvalidTimestamp {
            event_id: raw.id.clone(),
            field,
            value: value.to_string(),
            source,
        })
}
