//! Gauge classification and label keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of upcoming entry a gauge reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GaugeKind {
    /// An event with at least one other attendee.
    #[serde(rename = "meeting")]
    Meeting,
    /// An event the calendar owner attends alone.
    #[serde(rename = "focusTime")]
    FocusTime,
}

impl GaugeKind {
    /// Every kind, in reporting order.
    pub const ALL: [GaugeKind; 2] = [GaugeKind::Meeting, GaugeKind::FocusTime];

    /// Returns the label value used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::FocusTime => "focusTime",
        }
    }
}

impl fmt::Display for GaugeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one gauge series: a calendar and a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GaugeKey {
    /// The calendar identifier.
    pub calendar: String,
    /// The kind of entry.
    pub kind: GaugeKind,
}

impl GaugeKey {
    /// Creates a new gauge key.
    pub fn new(calendar: impl Into<String>, kind: GaugeKind) -> Self {
        Self {
            calendar: calendar.into(),
            kind,
        }
    }

    /// Returns the label values in `[calendar, kind]` order.
    pub fn label_values(&self) -> [&str; 2] {
        [self.calendar.as_str(), self.kind.as_str()]
    }
}

impl fmt::Display for GaugeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.calendar, self.kind)
    }
}
