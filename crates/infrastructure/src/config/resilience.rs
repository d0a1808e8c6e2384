//! Resilience sections: circuit breaker, fallback, chaos.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    adapters::{CircuitBreakerConfig, FallbackConfig},
    chaos::{ChaosControllerConfig, ToxiproxyConfig},
    retry::RetryConfig,
};

use super::default_true;

// ==============================
// Circuit Breaker Configuration
// ==============================

/// Circuit breaker settings shared by every key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSection {
    /// Consecutive failures before the circuit opens (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open in milliseconds (default: 10000ms)
    #[serde(default = "default_open_duration")]
    pub open_duration_ms: u64,

    /// Concurrent probes admitted while half-open (default: 1)
    #[serde(default = "default_probes")]
    pub half_open_max_probes: u32,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_open_duration() -> u64 {
    10_000
}

const fn default_probes() -> u32 {
    1
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_ms: default_open_duration(),
            half_open_max_probes: default_probes(),
        }
    }
}

impl CircuitBreakerSection {
    #[must_use]
    pub const fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::custom(
            self.failure_threshold,
            Duration::from_millis(self.open_duration_ms),
            self.half_open_max_probes,
        )
    }
}

// ==============================
// Fallback Configuration
// ==============================

/// Fallback provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSection {
    /// How long a live value stays usable as fallback in seconds (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum number of remembered keys (default: 1000)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Serve the built-in product list as default dataset (default: true)
    #[serde(default = "default_true")]
    pub default_products: bool,
}

const fn default_cache_ttl() -> u64 {
    300
}

const fn default_cache_capacity() -> u64 {
    1_000
}

impl Default for FallbackSection {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            default_products: true,
        }
    }
}

impl FallbackSection {
    #[must_use]
    pub const fn to_fallback_config(&self) -> FallbackConfig {
        FallbackConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_capacity: self.cache_capacity,
        }
    }
}

// ==============================
// Chaos Configuration
// ==============================

/// Fault-injection control plane settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosSection {
    /// Inject faults at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Toxiproxy admin API URL (default: http://localhost:8474)
    #[serde(default = "default_toxiproxy_url")]
    pub toxiproxy_url: String,

    /// Timeout for one control plane request in milliseconds (default: 5000ms)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Backoff for fault removal
    #[serde(default = "RetryConfig::control_plane")]
    pub removal_retry: RetryConfig,
}

fn default_toxiproxy_url() -> String {
    "http://localhost:8474".to_string()
}

const fn default_request_timeout() -> u64 {
    5_000
}

impl Default for ChaosSection {
    fn default() -> Self {
        Self {
            enabled: true,
            toxiproxy_url: default_toxiproxy_url(),
            request_timeout_ms: default_request_timeout(),
            removal_retry: RetryConfig::control_plane(),
        }
    }
}

impl ChaosSection {
    #[must_use]
    pub fn to_toxiproxy_config(&self) -> ToxiproxyConfig {
        ToxiproxyConfig {
            base_url: self.toxiproxy_url.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    #[must_use]
    pub fn to_controller_config(&self) -> ChaosControllerConfig {
        ChaosControllerConfig {
            removal_retry: self.removal_retry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_defaults_match_registry_defaults() {
        assert_eq!(
            CircuitBreakerSection::default().to_breaker_config(),
            CircuitBreakerConfig::default()
        );
    }

    #[test]
    fn fallback_defaults_match_provider_defaults() {
        assert_eq!(
            FallbackSection::default().to_fallback_config(),
            FallbackConfig::default()
        );
    }

    #[test]
    fn chaos_conversions() {
        let section = ChaosSection {
            toxiproxy_url: "http://toxiproxy:8474".to_string(),
            request_timeout_ms: 250,
            ..ChaosSection::default()
        };

        let client = section.to_toxiproxy_config();
        assert_eq!(client.base_url, "http://toxiproxy:8474");
        assert_eq!(client.timeout, Duration::from_millis(250));
        assert_eq!(
            section.to_controller_config().removal_retry,
            RetryConfig::control_plane()
        );
    }

    #[test]
    fn chaos_section_deserializes_with_defaults() {
        let section: ChaosSection =
            serde_json::from_str(r#"{"removal_retry":{"max_attempts":9}}"#).unwrap();

        assert!(section.enabled);
        assert_eq!(section.removal_retry.max_attempts, 9);
        assert_eq!(section.removal_retry.initial_delay_ms, 100);
    }
}
