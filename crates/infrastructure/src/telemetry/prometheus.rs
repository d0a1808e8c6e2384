//! Prometheus recorder installation
//!
//! The metrics sinks write through the `metrics` facade; these helpers
//! install the Prometheus recorder behind it.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::TelemetryError;

/// Serve metrics on `addr` for scraping
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if the listener cannot be bound or a
/// global recorder is already installed.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<(), TelemetryError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Install the recorder without a listener; render through the handle
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global recorder is already
/// installed.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, TelemetryError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}
