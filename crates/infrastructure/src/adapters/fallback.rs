//! Fallback provider
//!
//! Supplies substitute data when a call was blocked by an open circuit or
//! ran out of retries. Lookup order for a key: the last live value remembered
//! for it, the static dataset configured for it, then the default dataset.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use application::MetricsSinkPort;
use domain::{CircuitKey, MetricKind, ResilienceMetricEvent};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

/// Why substitute data was needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The circuit breaker blocked the call
    CircuitOpen,
    /// Every retry attempt failed
    RetriesExhausted,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => write!(f, "circuit_open"),
            Self::RetriesExhausted => write!(f, "retries_exhausted"),
        }
    }
}

/// Where substitute data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstituteOrigin {
    /// Last value seen from a live call
    Cached,
    /// Dataset configured for the key
    Static,
    /// Default dataset
    Default,
}

/// Substitute result handed to the workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteData {
    pub key: CircuitKey,
    pub data: Value,
    pub origin: SubstituteOrigin,
}

/// Configuration of the last-known-good cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackConfig {
    /// How long a remembered value stays usable
    pub cache_ttl: Duration,
    /// Maximum number of remembered keys
    pub cache_capacity: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1_000,
        }
    }
}

/// Product list served when the product catalogue is unavailable
#[must_use]
pub fn default_products() -> Value {
    json!([
        { "id": 1, "name": "Fallback Product 1", "price": 99.99 },
        { "id": 2, "name": "Fallback Product 2", "price": 149.99 },
    ])
}

/// Deterministic substitute data per key
pub struct FallbackProvider {
    datasets: HashMap<CircuitKey, Value>,
    default_data: Value,
    cache: Cache<CircuitKey, Value>,
    sink: Arc<dyn MetricsSinkPort>,
}

impl fmt::Debug for FallbackProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackProvider")
            .field("datasets", &self.datasets.len())
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl FallbackProvider {
    /// Create a provider with an empty JSON array as default dataset
    #[must_use]
    pub fn new(config: FallbackConfig, sink: Arc<dyn MetricsSinkPort>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            datasets: HashMap::new(),
            default_data: Value::Array(Vec::new()),
            cache,
            sink,
        }
    }

    /// Register a static dataset for `key`
    #[must_use]
    pub fn with_dataset(mut self, key: impl Into<CircuitKey>, data: Value) -> Self {
        self.datasets.insert(key.into(), data);
        self
    }

    /// Replace the default dataset
    #[must_use]
    pub fn with_default(mut self, data: Value) -> Self {
        self.default_data = data;
        self
    }

    /// Remember a live value as last-known-good data for `key`
    pub async fn remember(&self, key: &CircuitKey, data: Value) {
        self.cache.insert(key.clone(), data).await;
    }

    /// Forget remembered data for `key`
    pub async fn forget(&self, key: &CircuitKey) {
        self.cache.invalidate(key).await;
    }

    /// Supply substitute data for `key`; never fails
    #[instrument(skip(self, key), fields(circuit = %key))]
    pub async fn supply(&self, key: &CircuitKey, reason: FallbackReason) -> SubstituteData {
        let (data, origin) = if let Some(cached) = self.cache.get(key).await {
            (cached, SubstituteOrigin::Cached)
        } else if let Some(data) = self.datasets.get(key) {
            (data.clone(), SubstituteOrigin::Static)
        } else {
            debug!("No dataset configured, using default");
            (self.default_data.clone(), SubstituteOrigin::Default)
        };

        warn!(%reason, ?origin, "Using fallback data");
        self.sink.record(
            ResilienceMetricEvent::count(MetricKind::Fallback)
                .with_tag("key", key.as_str())
                .with_tag("reason", reason.to_string()),
        );

        SubstituteData {
            key: key.clone(),
            data,
            origin,
        }
    }
}
