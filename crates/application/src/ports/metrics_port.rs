//! Metrics sink port

use domain::ResilienceMetricEvent;
#[cfg(test)]
use mockall::automock;

/// Receives structured resilience events
///
/// Recording is synchronous, non-blocking and infallible: a sink swallows
/// its own failures and never delays the caller.
#[cfg_attr(test, automock)]
pub trait MetricsSinkPort: Send + Sync {
    /// Record one event
    fn record(&self, event: ResilienceMetricEvent);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use domain::MetricKind;

    use super::*;

    #[test]
    fn usable_as_trait_object() {
        let mut mock = MockMetricsSinkPort::new();
        mock.expect_record()
            .withf(|event| event.kind == MetricKind::Retry)
            .times(2)
            .return_const(());

        let sink: Arc<dyn MetricsSinkPort> = Arc::new(mock);
        sink.record(ResilienceMetricEvent::count(MetricKind::Retry));
        sink.record(ResilienceMetricEvent::count(MetricKind::Retry));
    }
}
