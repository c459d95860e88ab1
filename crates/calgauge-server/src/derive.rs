//! Gauge derivation.
//!
//! On every tick the deriver reads the latest published snapshot and, per
//! calendar, picks the earliest event of each [`GaugeKind`] that started
//! less than the grace window ago. Those become gauge values; every other
//! key the deriver knows about is deleted from the sink. Nothing here
//! touches the network.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use calgauge_core::{CalendarEvents, Event, GaugeKey, GaugeKind, Snapshot};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::config::DeriveConfig;
use crate::metrics::{GaugeMetric, GaugeSink};
use crate::signals::ShutdownHandle;

/// The earliest qualifying event of each kind for one calendar.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct NextEvents<'a> {
    /// Earliest event with other attendees.
    pub meeting: Option<&'a Event>,
    /// Earliest event without other attendees.
    pub focus_time: Option<&'a Event>,
}

impl<'a> NextEvents<'a> {
    /// Returns the event found for `kind`.
    pub fn get(&self, kind: GaugeKind) -> Option<&'a Event> {
        match kind {
            GaugeKind::Meeting => self.meeting,
            GaugeKind::FocusTime => self.focus_time,
        }
    }

    fn slot(&mut self, kind: GaugeKind) -> &mut Option<&'a Event> {
        match kind {
            GaugeKind::Meeting => &mut self.meeting,
            GaugeKind::FocusTime => &mut self.focus_time,
        }
    }

    fn is_complete(&self) -> bool {
        self.meeting.is_some() && self.focus_time.is_some()
    }
}

/// Selects the earliest event of each kind starting after `now - grace`.
///
/// Events are sorted, so the first match per kind wins and the scan stops
/// once both kinds are found. A grace reaching before the representable
/// range keeps every event.
pub fn next_by_kind(
    events: &CalendarEvents,
    now: DateTime<Utc>,
    grace: chrono::Duration,
) -> NextEvents<'_> {
    let mut next = NextEvents::default();
    let cutoff = now
        .checked_sub_signed(grace)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    for event in events.upcoming(cutoff) {
        let slot = next.slot(event.kind());
        if slot.is_none() {
            *slot = Some(event);
            if next.is_complete() {
                break;
            }
        }
    }
    next
}

/// Publishes and retracts gauges from snapshots.
pub struct GaugeDeriver {
    sink: Arc<dyn GaugeSink>,
    grace: chrono::Duration,
    interval: Duration,
    published: BTreeSet<GaugeKey>,
}

impl GaugeDeriver {
    /// Creates a deriver writing to `sink`.
    pub fn new(sink: Arc<dyn GaugeSink>, config: &DeriveConfig) -> Self {
        Self {
            sink,
            grace: config.grace,
            interval: config.interval,
            published: BTreeSet::new(),
        }
    }

    /// Keys holding a value after the last pass.
    pub fn published(&self) -> &BTreeSet<GaugeKey> {
        &self.published
    }

    /// Runs one derivation pass against `snapshot`.
    ///
    /// Keys of calendars missing from `snapshot` are retracted along with
    /// kinds that have no qualifying event.
    pub fn derive(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        let mut current = BTreeSet::new();
        let mut candidates = BTreeSet::new();

        for (calendar, events) in snapshot.iter() {
            let next = next_by_kind(events, now, self.grace);
            for kind in GaugeKind::ALL {
                let key = GaugeKey::new(calendar, kind);
                match next.get(kind) {
                    Some(event) => {
                        self.publish(&key, event, now);
                        current.insert(key);
                    }
                    None => {
                        candidates.insert(key);
                    }
                }
            }
        }

        candidates.extend(
            self.published
                .iter()
                .filter(|key| !current.contains(*key))
                .cloned(),
        );
        for key in &candidates {
            for metric in GaugeMetric::ALL {
                self.sink.delete(metric, key);
            }
        }

        trace!(
            published = current.len(),
            retracted = candidates.len(),
            "derived gauges"
        );
        self.published = current;
    }

    fn publish(&self, key: &GaugeKey, event: &Event, now: DateTime<Utc>) {
        let until = (event.starts - now).num_milliseconds() as f64 / 1000.0;
        self.sink.set(GaugeMetric::Seconds, key, until);
        self.sink
            .set(GaugeMetric::EpochSeconds, key, event.starts.timestamp() as f64);
    }

    /// Derives on every tick until shutdown.
    ///
    /// Each pass works on one snapshot reference cloned out of the channel,
    /// so a concurrent publication is never observed half-applied.
    pub async fn run(mut self, snapshots: watch::Receiver<Arc<Snapshot>>, shutdown: ShutdownHandle) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            grace_secs = self.grace.num_seconds(),
            "gauge derivation started"
        );

        let stop = shutdown.wait().wait();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let snapshot = Arc::clone(&snapshots.borrow());
                    self.derive(&snapshot, Utc::now());
                }
            }
        }

        debug!(published = self.published.len(), "gauge derivation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        values: Mutex<HashMap<(GaugeMetric, GaugeKey), f64>>,
        deletes: Mutex<u32>,
    }

    impl RecordingSink {
        fn get(&self, metric: GaugeMetric, calendar: &str, kind: GaugeKind) -> Option<f64> {
            self.values
                .lock()
                .unwrap()
                .get(&(metric, GaugeKey::new(calendar, kind)))
                .copied()
        }

        fn series(&self) -> usize {
            self.values.lock().unwrap().len()
        }
    }

    impl GaugeSink for RecordingSink {
        fn set(&self, metric: GaugeMetric, key: &GaugeKey, value: f64) {
            self.values.lock().unwrap().insert((metric, key.clone()), value);
        }

        fn delete(&self, metric: GaugeMetric, key: &GaugeKey) {
            *self.deletes.lock().unwrap() += 1;
            self.values.lock().unwrap().remove(&(metric, key.clone()));
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap()
    }

    fn event(minutes: i64) -> Event {
        Event::new(format!("at {}", minutes), now() + chrono::Duration::minutes(minutes))
    }

    fn meeting(minutes: i64) -> Event {
        event(minutes).with_attendee("x@example.com")
    }

    fn snapshot(calendars: Vec<(&str, Vec<Event>)>) -> Snapshot {
        let calendars = calendars
            .into_iter()
            .map(|(id, events)| (id.to_string(), events.into_iter().collect::<CalendarEvents>()))
            .collect::<BTreeMap<_, _>>();
        Snapshot::new(now(), calendars)
    }

    fn deriver() -> (Arc<RecordingSink>, GaugeDeriver) {
        let sink = Arc::new(RecordingSink::default());
        let deriver = GaugeDeriver::new(sink.clone(), &DeriveConfig::default());
        (sink, deriver)
    }

    #[test]
    fn next_by_kind_picks_earliest_per_kind() {
        let events: CalendarEvents = vec![meeting(30), event(2), meeting(10), event(45)]
            .into_iter()
            .collect();
        let next = next_by_kind(&events, now(), chrono::Duration::minutes(3));

        assert_eq!(next.meeting.unwrap().starts, now() + chrono::Duration::minutes(10));
        assert_eq!(next.focus_time.unwrap().starts, now() + chrono::Duration::minutes(2));
    }

    #[test]
    fn next_by_kind_honours_grace_window() {
        let events: CalendarEvents = vec![event(-2), event(-5)].into_iter().collect();
        let next = next_by_kind(&events, now(), chrono::Duration::minutes(3));
        assert_eq!(next.focus_time.unwrap().starts, now() - chrono::Duration::minutes(2));

        let next = next_by_kind(&events, now(), chrono::Duration::zero());
        assert!(next.focus_time.is_none());
    }

    #[test]
    fn publishes_seconds_and_epoch() {
        let (sink, mut deriver) = deriver();
        deriver.derive(&snapshot(vec![("cal1", vec![event(2), meeting(10)])]), now());

        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::FocusTime), Some(120.0));
        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::Meeting), Some(600.0));
        let epoch = (now() + chrono::Duration::minutes(10)).timestamp() as f64;
        assert_eq!(sink.get(GaugeMetric::EpochSeconds, "cal1", GaugeKind::Meeting), Some(epoch));
        assert_eq!(deriver.published().len(), 2);
    }

    #[test]
    fn event_past_grace_window_is_retracted() {
        let (sink, mut deriver) = deriver();
        deriver.derive(&snapshot(vec![("cal1", vec![event(1)])]), now());
        assert_eq!(sink.series(), 2);

        deriver.derive(&snapshot(vec![("cal1", vec![event(1)])]), now() + chrono::Duration::minutes(6));
        assert_eq!(sink.series(), 0);
        assert!(deriver.published().is_empty());
    }

    #[test]
    fn only_past_events_publish_nothing() {
        let (sink, mut deriver) = deriver();
        deriver.derive(&snapshot(vec![("cal1", vec![event(-5)])]), now());
        assert_eq!(sink.series(), 0);
    }

    #[test]
    fn next_by_kind_with_oversized_grace_keeps_past_events() {
        let events: CalendarEvents = vec![event(-5)].into_iter().collect();
        let next = next_by_kind(&events, now(), chrono::Duration::seconds(9_000_000_000_000_000));
        assert_eq!(next.focus_time.unwrap().starts, now() - chrono::Duration::minutes(5));
    }

    #[test]
    fn earliest_of_two_meetings_wins() {
        let (sink, mut deriver) = deriver();
        deriver.derive(&snapshot(vec![("cal1", vec![meeting(5), meeting(1)])]), now());

        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::Meeting), Some(60.0));
        let epoch = (now() + chrono::Duration::minutes(1)).timestamp() as f64;
        assert_eq!(sink.get(GaugeMetric::EpochSeconds, "cal1", GaugeKind::Meeting), Some(epoch));
        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::FocusTime), None);
        assert_eq!(sink.series(), 2);
    }

    #[test]
    fn repeated_derivation_is_idempotent() {
        let (sink, mut deriver) = deriver();
        let snap = snapshot(vec![("cal1", vec![meeting(5)])]);

        deriver.derive(&snap, now());
        deriver.derive(&snap, now());

        assert_eq!(sink.series(), 2);
        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::FocusTime), None);
    }

    #[test]
    fn vanished_calendar_is_retracted() {
        let (sink, mut deriver) = deriver();
        deriver.derive(
            &snapshot(vec![("cal1", vec![meeting(5)]), ("cal2", vec![event(5)])]),
            now(),
        );
        assert_eq!(sink.series(), 4);

        deriver.derive(&snapshot(vec![("cal2", vec![event(5)])]), now());

        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::Meeting), None);
        assert_eq!(sink.get(GaugeMetric::Seconds, "cal2", GaugeKind::FocusTime), Some(300.0));
        assert_eq!(sink.series(), 2);
    }

    #[test]
    fn value_counts_down_between_refreshes() {
        let (sink, mut deriver) = deriver();
        let snap = snapshot(vec![("cal1", vec![meeting(10)])]);

        deriver.derive(&snap, now());
        deriver.derive(&snap, now() + chrono::Duration::seconds(90));

        assert_eq!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::Meeting), Some(510.0));
    }

    #[tokio::test(start_paused = true)]
    async fn run_derives_latest_snapshot_until_shutdown() {
        let sink = Arc::new(RecordingSink::default());
        let deriver = GaugeDeriver::new(sink.clone(), &DeriveConfig::default());
        let soon = Event::new("soon", Utc::now() + chrono::Duration::hours(1)).with_attendee("x");
        let (tx, rx) = watch::channel(Arc::new(Snapshot::empty()));

        let signals = crate::signals::SignalHandler::new();
        let task = tokio::spawn(deriver.run(rx, signals.shutdown_handle()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(sink.series(), 0);

        let calendars = BTreeMap::from([("cal1".to_string(), CalendarEvents::from_iter([soon]))]);
        tx.send_replace(Arc::new(Snapshot::new(Utc::now(), calendars)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.get(GaugeMetric::Seconds, "cal1", GaugeKind::Meeting).is_some());

        signals.trigger_shutdown();
        task.await.unwrap();
    }
}
