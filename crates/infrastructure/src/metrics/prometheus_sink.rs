//! Metrics sink backed by the `metrics` facade
//!
//! Counters become `counter!`, rates become a counter labelled
//! `outcome="pass"|"fail"`, trends become `histogram!`. Whatever recorder is
//! installed (see `telemetry::install_prometheus_exporter`) receives them;
//! without a recorder events are dropped.

use application::MetricsSinkPort;
use domain::{Instrument, ResilienceMetricEvent};
use metrics::Label;

/// Forwards resilience events to the global metrics recorder
#[derive(Debug, Clone, Default)]
pub struct PrometheusSink {
    global_tags: Vec<(String, String)>,
}

impl PrometheusSink {
    /// Create a sink without global tags
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag to every event, such as the run id
    #[must_use]
    pub fn with_global_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_tags.push((key.into(), value.into()));
        self
    }

    fn labels(&self, event: &ResilienceMetricEvent) -> Vec<Label> {
        self.global_tags
            .iter()
            .chain(event.tags.iter())
            .map(|(k, v)| Label::new(k.clone(), v.clone()))
            .collect()
    }
}

impl MetricsSinkPort for PrometheusSink {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn record(&self, event: ResilienceMetricEvent) {
        let name = event.kind.metric_name();
        let mut labels = self.labels(&event);

        match event.kind.instrument() {
            Instrument::Counter => {
                metrics::counter!(name, labels).increment(event.value.max(0.0) as u64);
            },
            Instrument::Rate => {
                let outcome = if event.is_pass() { "pass" } else { "fail" };
                labels.push(Label::new("outcome", outcome));
                metrics::counter!(name, labels).increment(1);
            },
            Instrument::Trend => {
                metrics::histogram!(name, labels).record(event.value);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::MetricKind;
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn events_reach_the_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let sink = PrometheusSink::new().with_global_tag("run_id", "r1");

        metrics::with_local_recorder(&recorder, || {
            sink.record(ResilienceMetricEvent::count(MetricKind::Retry).with_tag("scope", "chaos"));
            sink.record(ResilienceMetricEvent::rate(MetricKind::ResilienceOutcome, true));
            sink.record(ResilienceMetricEvent::rate(MetricKind::ResilienceOutcome, false));
            sink.record(ResilienceMetricEvent::new(MetricKind::RecoveryTime, 300.0));
        });

        let rendered = handle.render();
        assert!(rendered.contains("retry_attempts"));
        assert!(rendered.contains(r#"scope="chaos""#));
        assert!(rendered.contains(r#"run_id="r1""#));
        assert!(rendered.contains(r#"outcome="pass""#));
        assert!(rendered.contains(r#"outcome="fail""#));
        assert!(rendered.contains("recovery_time"));
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        PrometheusSink::new().record(ResilienceMetricEvent::count(MetricKind::Fallback));
    }
}
