use std::sync::Arc;

use application::MetricsSinkPort;
use domain::ResilienceMetricEvent;

/// Forwards every event to each inner sink
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSinkPort>>,
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    /// Create an empty fanout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn MetricsSinkPort>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl MetricsSinkPort for FanoutSink {
    fn record(&self, event: ResilienceMetricEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::MetricKind;

    use super::*;
    use crate::metrics::RecordingSink;

    #[test]
    fn every_sink_receives_the_event() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone());

        fanout.record(ResilienceMetricEvent::count(MetricKind::Fallback));

        assert_eq!(a.count(MetricKind::Fallback), 1);
        assert_eq!(b.count(MetricKind::Fallback), 1);
    }

    #[test]
    fn empty_fanout_drops_events() {
        FanoutSink::new().record(ResilienceMetricEvent::count(MetricKind::Retry));
    }
}
