//! Gauge sink and its Prometheus implementation.

use calgauge_core::GaugeKey;
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use tracing::trace;

use crate::error::ServerResult;

/// Label names shared by both gauge families.
const LABELS: [&str; 2] = ["calendar", "kind"];

/// The two gauge families published per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GaugeMetric {
    /// Seconds from now until the event starts.
    Seconds,
    /// Absolute start time as Unix epoch seconds.
    EpochSeconds,
}

impl GaugeMetric {
    /// Both families.
    pub const ALL: [GaugeMetric; 2] = [GaugeMetric::Seconds, GaugeMetric::EpochSeconds];
}

/// A labelled gauge registry.
///
/// Deleting a series that does not exist must be a no-op.
pub trait GaugeSink: Send + Sync {
    /// Sets the value of one series.
    fn set(&self, metric: GaugeMetric, key: &GaugeKey, value: f64);

    /// Removes one series.
    fn delete(&self, metric: GaugeMetric, key: &GaugeKey);
}

/// Prometheus-backed gauges in a private registry.
#[derive(Clone)]
pub struct PrometheusGauges {
    registry: Registry,
    seconds: GaugeVec,
    epoch: GaugeVec,
}

impl PrometheusGauges {
    /// Creates both gauge families and registers them.
    pub fn new() -> ServerResult<Self> {
        let registry = Registry::new();

        let seconds = GaugeVec::new(
            Opts::new(
                "next_meeting_seconds",
                "Seconds until the next upcoming event of this kind",
            )
            .subsystem("calendar"),
            &LABELS,
        )?;
        registry.register(Box::new(seconds.clone()))?;

        let epoch = GaugeVec::new(
            Opts::new(
                "next_meeting_epoch_seconds",
                "Start of the next upcoming event of this kind as Unix time",
            )
            .subsystem("calendar"),
            &LABELS,
        )?;
        registry.register(Box::new(epoch.clone()))?;

        Ok(Self {
            registry,
            seconds,
            epoch,
        })
    }

    /// Returns the registry, for callers that add their own collectors.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every registered family in the text exposition format.
    pub fn encode(&self) -> ServerResult<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    fn family(&self, metric: GaugeMetric) -> &GaugeVec {
        match metric {
            GaugeMetric::Seconds => &self.seconds,
            GaugeMetric::EpochSeconds => &self.epoch,
        }
    }
}

impl GaugeSink for PrometheusGauges {
    fn set(&self, metric: GaugeMetric, key: &GaugeKey, value: f64) {
        self.family(metric)
            .with_label_values(&key.label_values())
            .set(value);
    }

    fn delete(&self, metric: GaugeMetric, key: &GaugeKey) {
        if self
            .family(metric)
            .remove_label_values(&key.label_values())
            .is_ok()
        {
            trace!(key = %key, ?metric, "removed gauge series");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calgauge_core::GaugeKind;

    #[test]
    fn set_appears_in_exposition() {
        let gauges = PrometheusGauges::new().unwrap();
        let key = GaugeKey::new("cal1", GaugeKind::FocusTime);
        gauges.set(GaugeMetric::Seconds, &key, 120.0);
        gauges.set(GaugeMetric::EpochSeconds, &key, 1_738_746_000.0);

        let text = gauges.encode().unwrap();
        assert!(text.contains("# TYPE calendar_next_meeting_seconds gauge"));
        assert!(text.contains(r#"calendar_next_meeting_seconds{calendar="cal1",kind="focusTime"} 120"#));
        assert!(text.contains(r#"calendar_next_meeting_epoch_seconds{calendar="cal1",kind="focusTime"} 1738746000"#));
    }

    #[test]
    fn delete_removes_series() {
        let gauges = PrometheusGauges::new().unwrap();
        let meeting = GaugeKey::new("cal1", GaugeKind::Meeting);
        let focus = GaugeKey::new("cal1", GaugeKind::FocusTime);
        gauges.set(GaugeMetric::Seconds, &meeting, 600.0);
        gauges.set(GaugeMetric::Seconds, &focus, 60.0);

        gauges.delete(GaugeMetric::Seconds, &meeting);

        let text = gauges.encode().unwrap();
        assert!(!text.contains(r#"kind="meeting""#));
        assert!(text.contains(r#"kind="focusTime""#));
    }

    #[test]
    fn deleting_absent_series_is_noop() {
        let gauges = PrometheusGauges::new().unwrap();
        let key = GaugeKey::new("ghost", GaugeKind::Meeting);
        gauges.delete(GaugeMetric::Seconds, &key);
        gauges.delete(GaugeMetric::EpochSeconds, &key);
        assert!(!gauges.encode().unwrap().contains("ghost"));
    }

    #[test]
    fn registries_are_independent() {
        let a = PrometheusGauges::new().unwrap();
        let b = PrometheusGauges::new().unwrap();
        a.set(GaugeMetric::Seconds, &GaugeKey::new("only-a", GaugeKind::Meeting), 1.0);
        assert!(!b.encode().unwrap().contains("only-a"));
    }
}
