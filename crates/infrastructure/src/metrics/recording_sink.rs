//! In-memory metrics sink

use std::collections::HashMap;

use application::MetricsSinkPort;
use domain::{MetricKind, ResilienceMetricEvent};
use parking_lot::Mutex;

/// Keeps every recorded event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ResilienceMetricEvent>>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded event, in order
    #[must_use]
    pub fn events(&self) -> Vec<ResilienceMetricEvent> {
        self.events.lock().clone()
    }

    /// Number of events of `kind`
    #[must_use]
    pub fn count(&self, kind: MetricKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// Values of the events of `kind`, in order
    #[must_use]
    pub fn values(&self, kind: MetricKind) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value)
            .collect()
    }

    /// Number of events per kind
    #[must_use]
    pub fn counts(&self) -> HashMap<MetricKind, usize> {
        let mut counts = HashMap::new();
        for event in self.events.lock().iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Fraction of passing `resilience_outcome` samples
    ///
    /// Returns `None` when no sample was recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn resilience_rate(&self) -> Option<f64> {
        let events = self.events.lock();
        let (passed, total) = events
            .iter()
            .filter(|e| e.kind == MetricKind::ResilienceOutcome)
            .fold((0_usize, 0_usize), |(passed, total), e| {
                (passed + usize::from(e.is_pass()), total + 1)
            });

        (total > 0).then(|| passed as f64 / total as f64)
    }

    /// Drop every recorded event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl MetricsSinkPort for RecordingSink {
    fn record(&self, event: ResilienceMetricEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_values() {
        let sink = RecordingSink::new();
        sink.record(ResilienceMetricEvent::count(MetricKind::Retry));
        sink.record(ResilienceMetricEvent::count(MetricKind::Retry));
        sink.record(ResilienceMetricEvent::new(MetricKind::RecoveryTime, 300.0));

        assert_eq!(sink.count(MetricKind::Retry), 2);
        assert_eq!(sink.values(MetricKind::RecoveryTime), vec![300.0]);
        assert_eq!(sink.counts().get(&MetricKind::Retry), Some(&2));
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn resilience_rate() {
        let sink = RecordingSink::new();
        assert_eq!(sink.resilience_rate(), None);

        for pass in [true, true, true, false] {
            sink.record(ResilienceMetricEvent::rate(MetricKind::ResilienceOutcome, pass));
        }
        sink.record(ResilienceMetricEvent::count(MetricKind::CircuitOpen));

        assert_eq!(sink.resilience_rate(), Some(0.75));
    }

    #[test]
    fn clear_drops_events() {
        let sink = RecordingSink::new();
        sink.record(ResilienceMetricEvent::count(MetricKind::Fallback));
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
