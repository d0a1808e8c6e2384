//! Resilience configuration
//!
//! Split into focused sub-modules:
//! - `resilience`: circuit breaker, fallback and chaos sections
//!
//! Retry settings reuse [`RetryConfig`] and telemetry settings reuse
//! [`TelemetryConfig`] directly.
//!
//! Values are layered: defaults, then an optional `resilience.{toml,yaml,json}`
//! file, then environment variables such as
//! `RESILIENCE_CIRCUIT_BREAKER__FAILURE_THRESHOLD=3`.

mod resilience;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use resilience::{ChaosSection, CircuitBreakerSection, FallbackSection};

use crate::{retry::RetryConfig, telemetry::TelemetryConfig};

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Environment variable prefix
pub const ENV_PREFIX: &str = "RESILIENCE";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were loaded but are out of bounds
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Complete configuration of the resilience core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSection,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub chaos: ChaosSection,

    #[serde(default)]
    pub fallback: FallbackSection,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ResilienceConfig {
    /// Load configuration from `resilience.*` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("resilience")
    }

    /// Load configuration from the file stem `name` and the environment
    pub fn load_from(name: &str) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(environment(None));

        Self::build(builder)
    }

    /// Load configuration from TOML text, with `env` as environment overrides
    pub fn from_toml(
        toml: &str,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .add_source(environment(env));

        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?config, "Resilience configuration loaded");
        Ok(config)
    }

    /// Check every bound, reporting all violations at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        let breaker = &self.circuit_breaker;
        if breaker.failure_threshold == 0 {
            violations.push("circuit_breaker.failure_threshold must be > 0".to_string());
        }
        if breaker.open_duration_ms == 0 {
            violations.push("circuit_breaker.open_duration_ms must be > 0".to_string());
        }
        if breaker.half_open_max_probes == 0 {
            violations.push("circuit_breaker.half_open_max_probes must be >= 1".to_string());
        }

        check_retry("retry", &self.retry, &mut violations);
        check_retry("chaos.removal_retry", &self.chaos.removal_retry, &mut violations);

        match reqwest::Url::parse(&self.chaos.toxiproxy_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {},
            _ => violations.push(format!(
                "chaos.toxiproxy_url is not an http(s) URL: {}",
                self.chaos.toxiproxy_url
            )),
        }
        if self.chaos.request_timeout_ms == 0 {
            violations.push("chaos.request_timeout_ms must be > 0".to_string());
        }
        if self.fallback.cache_capacity == 0 {
            violations.push("fallback.cache_capacity must be > 0".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(violations))
        }
    }
}

fn environment(source: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(source)
}

fn check_retry(section: &str, retry: &RetryConfig, violations: &mut Vec<String>) {
    if retry.max_attempts == 0 {
        violations.push(format!("{section}.max_attempts must be >= 1"));
    }
    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        violations.push(format!("{section}.multiplier must be >= 1"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        violations.push(format!("{section}.jitter_factor must be within [0, 1]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.chaos.toxiproxy_url, "http://localhost:8474");
    }

    #[test]
    fn loads_toml() {
        let config = ResilienceConfig::from_toml(
            r#"
            [circuit_breaker]
            failure_threshold = 3
            open_duration_ms = 5000

            [retry]
            max_attempts = 4
            jitter_enabled = true

            [chaos]
            toxiproxy_url = "http://toxiproxy:8474"
            "#,
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.half_open_max_probes, 1);
        assert_eq!(config.retry.max_attempts, 4);
        assert!(config.retry.jitter_enabled);
        assert_eq!(config.chaos.toxiproxy_url, "http://toxiproxy:8474");
        assert_eq!(config.fallback.cache_ttl_secs, 300);
    }

    #[test]
    fn environment_overrides_file() {
        let config = ResilienceConfig::from_toml(
            "[circuit_breaker]\nfailure_threshold = 3\n",
            env(&[
                ("RESILIENCE_CIRCUIT_BREAKER__FAILURE_THRESHOLD", "7"),
                ("RESILIENCE_TELEMETRY__JSON_LOGS", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 7);
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn reports_every_violation() {
        let err = ResilienceConfig::from_toml(
            r#"
            [circuit_breaker]
            failure_threshold = 0
            half_open_max_probes = 0

            [retry]
            multiplier = 0.5

            [chaos]
            toxiproxy_url = "not a url"
            "#,
            env(&[]),
        )
        .unwrap_err();

        match err {
            ConfigError::Invalid(violations) => {
                assert_eq!(violations.len(), 4);
                assert!(violations[0].contains("failure_threshold"));
                assert!(violations.iter().any(|v| v.contains("retry.multiplier")));
                assert!(violations.iter().any(|v| v.contains("toxiproxy_url")));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let err = ResilienceConfig::from_toml("[retry\n", env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = ResilienceConfig::load_from("does-not-exist-resilience").unwrap();
        assert_eq!(config.circuit_breaker.open_duration_ms, 10_000);
    }
}
