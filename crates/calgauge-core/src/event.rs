//! Event types for calendar events.
//!
//! This module provides:
//! - [`Event`]: a normalized upcoming calendar entry
//! - [`CalendarEvents`]: the events of one calendar, kept sorted by start time

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gauge::GaugeKind;

/// A normalized calendar event.
///
/// Only events with a concrete start instant make it this far; all-day
/// entries and entries without a start are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The event title.
    pub title: String,
    /// When the event starts.
    pub starts: DateTime<Utc>,
    /// When the event ends, if the provider reported it.
    pub ends: Option<DateTime<Utc>>,
    /// Email addresses of the other attendees (the calendar owner excluded).
    pub attendees: BTreeSet<String>,
}

impl Event {
    /// Creates a new event without attendees.
    pub fn new(title: impl Into<String>, starts: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            starts,
            ends: None,
            attendees: BTreeSet::new(),
        }
    }

    /// Builder method to set the end time.
    pub fn with_ends(mut self, ends: DateTime<Utc>) -> Self {
        self.ends = Some(ends);
        self
    }

    /// Builder method to add an attendee.
    pub fn with_attendee(mut self, email: impl Into<String>) -> Self {
        self.attendees.insert(email.into());
        self
    }

    /// Returns true if anyone besides the calendar owner attends.
    pub fn has_attendees(&self) -> bool {
        !self.attendees.is_empty()
    }

    /// Classifies the event for gauge reporting.
    pub fn kind(&self) -> GaugeKind {
        if self.has_attendees() {
            GaugeKind::Meeting
        } else {
            GaugeKind::FocusTime
        }
    }
}

/// The events of one calendar, ordered ascending by start time.
///
/// The ordering holds after every insertion. Events sharing a start time
/// keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvents {
    events: Vec<Event>,
}

impl CalendarEvents {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event at its sorted position.
    pub fn insert(&mut self, event: Event) {
        let index = self.events.partition_point(|e| e.starts <= event.starts);
        self.events.insert(index, event);
    }

    /// Returns the events starting strictly after `cutoff`, in order.
    pub fn upcoming(&self, cutoff: DateTime<Utc>) -> &[Event] {
        let first = self.events.partition_point(|e| e.starts <= cutoff);
        &self.events[first..]
    }

    /// Returns all events in order.
    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Returns an iterator over the events in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the calendar has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns true if the events are ordered by start time.
    pub fn is_sorted(&self) -> bool {
        self.events.windows(2).all(|w| w[0].starts <= w[1].starts)
    }
}

impl FromIterator<Event> for CalendarEvents {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut events = Self::new();
        for event in iter {
            events.insert(event);
        }
        events
    }
}

impl<'a> IntoIterator for &'a CalendarEvents {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
