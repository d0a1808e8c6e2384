//! Resilience metric events

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a metric backend aggregates an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    /// Monotonic count, value is the increment
    Counter,
    /// Pass/fail ratio, non-zero value is a pass
    Rate,
    /// Distribution of samples
    Trend,
}

/// Kind of a resilience event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// A failed attempt will be retried
    Retry,
    /// A call succeeded after at least one retry
    SuccessAfterRetry,
    /// A call was blocked by an open circuit
    CircuitOpen,
    /// Substitute data was supplied
    Fallback,
    /// Time from the first attempt until a retried call succeeded (ms)
    RecoveryTime,
    /// Whether an iteration that reached the dependency got live data
    ResilienceOutcome,
    /// A fault was injected into the network path
    ChaosInjected,
    /// An inbound socket message was received
    WsMessagesReceived,
    /// Delay between a message timestamp and its receipt (ms)
    WsMessageLatency,
}

impl MetricKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 9] = [
        Self::Retry,
        Self::SuccessAfterRetry,
        Self::CircuitOpen,
        Self::Fallback,
        Self::RecoveryTime,
        Self::ResilienceOutcome,
        Self::ChaosInjected,
        Self::WsMessagesReceived,
        Self::WsMessageLatency,
    ];

    /// Aggregation used for this kind
    #[must_use]
    pub const fn instrument(self) -> Instrument {
        match self {
            Self::Retry
            | Self::SuccessAfterRetry
            | Self::CircuitOpen
            | Self::Fallback
            | Self::ChaosInjected
            | Self::WsMessagesReceived => Instrument::Counter,
            Self::ResilienceOutcome => Instrument::Rate,
            Self::RecoveryTime | Self::WsMessageLatency => Instrument::Trend,
        }
    }

    /// Name of the metric in the backend
    #[must_use]
    pub const fn metric_name(self) -> &'static str {
        match self {
            Self::Retry => "retry_attempts",
            Self::SuccessAfterRetry => "success_after_retry",
            Self::CircuitOpen => "circuit_breaker_opened",
            Self::Fallback => "fallback_used",
            Self::RecoveryTime => "recovery_time",
            Self::ResilienceOutcome => "resilience_score",
            Self::ChaosInjected => "chaos_injected",
            Self::WsMessagesReceived => "ws_messages_received",
            Self::WsMessageLatency => "ws_message_latency",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

/// One structured outcome event; write-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetricEvent {
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
}

impl ResilienceMetricEvent {
    /// Create an event without tags
    #[must_use]
    pub const fn new(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            tags: Vec::new(),
        }
    }

    /// Counter increment of one
    #[must_use]
    pub const fn count(kind: MetricKind) -> Self {
        Self::new(kind, 1.0)
    }

    /// Rate sample: pass or fail
    #[must_use]
    pub const fn rate(kind: MetricKind, pass: bool) -> Self {
        Self::new(kind, if pass { 1.0 } else { 0.0 })
    }

    /// Attach a tag
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Look up a tag value
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a rate event counts as a pass
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.value != 0.0
    }
}
