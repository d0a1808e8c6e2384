//! Telemetry infrastructure
//!
//! Structured logging through `tracing-subscriber` and Prometheus export for
//! the resilience metrics.

mod prometheus;
mod subscriber;

pub use prometheus::{install_prometheus_exporter, install_prometheus_recorder};
pub use subscriber::{TelemetryConfig, TelemetryError, init_tracing};
