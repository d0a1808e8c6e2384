//! Resilience metric sinks
//!
//! - `PrometheusSink`: forwards events to the `metrics` facade
//! - `RecordingSink`: keeps events in memory for run summaries and tests
//! - `FanoutSink`: forwards every event to several sinks

mod fanout_sink;
mod prometheus_sink;
mod recording_sink;

pub use fanout_sink::FanoutSink;
pub use prometheus_sink::PrometheusSink;
pub use recording_sink::RecordingSink;
