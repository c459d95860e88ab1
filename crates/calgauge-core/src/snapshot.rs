//! Point-in-time view of every calendar's upcoming events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::event::CalendarEvents;

/// An immutable mapping from calendar id to its ordered events.
///
/// A snapshot is assembled in full before it is published and never
/// changes afterwards. A calendar that failed to refresh is absent rather
/// than carried over from an older snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    built_at: DateTime<Utc>,
    calendars: BTreeMap<String, CalendarEvents>,
}

impl Snapshot {
    /// Creates a snapshot from fully built calendars.
    pub fn new(built_at: DateTime<Utc>, calendars: BTreeMap<String, CalendarEvents>) -> Self {
        Self {
            built_at,
            calendars,
        }
    }

    /// A snapshot with no calendars, used before the first build completes.
    pub fn empty() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH, BTreeMap::new())
    }

    /// The reference instant the snapshot was built for.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Returns the events of a calendar.
    pub fn get(&self, calendar: &str) -> Option<&CalendarEvents> {
        self.calendars.get(calendar)
    }

    /// Returns true if the calendar is present.
    pub fn contains(&self, calendar: &str) -> bool {
        self.calendars.contains_key(calendar)
    }

    /// Iterates over calendars in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CalendarEvents)> {
        self.calendars.iter().map(|(id, events)| (id.as_str(), events))
    }

    /// Iterates over calendar ids in order.
    pub fn calendar_ids(&self) -> impl Iterator<Item = &str> {
        self.calendars.keys().map(String::as_str)
    }

    /// Returns the number of calendars.
    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    /// Returns true if there are no calendars.
    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    /// Returns the total number of events across calendars.
    pub fn event_count(&self) -> usize {
        self.calendars.values().map(CalendarEvents::len).sum()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use chrono::TimeZone;

    #[test]
    fn empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.event_count(), 0);
        assert_eq!(snapshot.built_at(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn lookup_and_iteration() {
        let now = Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap();
        let mut calendars = BTreeMap::new();
        calendars.insert(
            "b@example.com".to_string(),
            [Event::new("x", now), Event::new("y", now)]
                .into_iter()
                .collect(),
        );
        calendars.insert("a@example.com".to_string(), CalendarEvents::new());

        let snapshot = Snapshot::new(now, calendars);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.event_count(), 2);
        assert!(snapshot.contains("a@example.com"));
        assert!(snapshot.get("missing").is_none());

        let ids: Vec<_> = snapshot.calendar_ids().collect();
        assert_eq!(ids, ["a@example.com", "b@example.com"]);
    }
}
