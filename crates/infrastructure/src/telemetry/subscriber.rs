//! Tracing subscriber initialization

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber or recorder could not be installed
    #[error("telemetry initialization failed: {0}")]
    Init(String),
}

/// Configuration for logging and metrics export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "infrastructure=debug"); `RUST_LOG`
    /// takes precedence when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json_logs: bool,

    /// Address of the Prometheus scrape endpoint; metrics are not exported
    /// when unset
    #[serde(default)]
    pub prometheus_listen: Option<SocketAddr>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
            prometheus_listen: None,
        }
    }
}

/// Install the global tracing subscriber
///
/// # Example
///
/// ```ignore
/// use infrastructure::telemetry::{TelemetryConfig, init_tracing};
///
/// init_tracing(&TelemetryConfig::default())?;
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init()
    };
    installed.map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(json = config.json_logs, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_filter, "info");
        assert!(!config.json_logs);
        assert!(config.prometheus_listen.is_none());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"json_logs":true,"prometheus_listen":"127.0.0.1:9000"}"#)
                .unwrap();

        assert!(config.json_logs);
        assert_eq!(config.log_filter, "info");
        assert_eq!(
            config.prometheus_listen,
            Some("127.0.0.1:9000".parse().unwrap())
        );
    }

    #[test]
    fn second_init_is_an_error() {
        let config = TelemetryConfig::default();
        let _ = init_tracing(&config);

        let err = init_tracing(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::Init(_)));
    }
}
