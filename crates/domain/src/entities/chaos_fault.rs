//! Chaos fault definitions.
//!
//! A fault is a named network impairment applied to one proxy of the
//! fault-injection control plane. Attributes are kept as a JSON object so the
//! control plane receives them verbatim.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DomainError;

/// Kinds of network impairment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// Added delay (and jitter) on every packet
    Latency,
    /// Connections stall and are closed after a timeout
    Timeout,
    /// A fraction of connections lose their data
    PacketLoss,
    /// Throughput limited to a rate in KB/s
    Bandwidth,
}

impl FaultType {
    /// Toxic type understood by the control plane
    ///
    /// Packet loss has no native toxic; it is a `timeout` toxic applied to
    /// the `toxicity` fraction of connections.
    #[must_use]
    pub const fn wire_type(self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Timeout | Self::PacketLoss => "timeout",
            Self::Bandwidth => "bandwidth",
        }
    }

    /// Stable label for metrics and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Timeout => "timeout",
            Self::PacketLoss => "packet_loss",
            Self::Bandwidth => "bandwidth",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deliberately injected network impairment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosFault {
    /// Unique name per proxy; injecting the same name replaces the fault
    pub name: String,
    /// Kind of impairment
    pub fault_type: FaultType,
    /// Proxy the fault is applied to (empty until bound)
    #[serde(default)]
    pub target_proxy: String,
    /// Type-specific parameters forwarded to the control plane
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Fraction of connections affected, within [0, 1]
    pub toxicity: f64,
    /// Whether the control plane acknowledged the fault
    #[serde(default)]
    pub active: bool,
}

impl ChaosFault {
    /// Create a fault with full toxicity and no attributes
    pub fn new(name: impl Into<String>, fault_type: FaultType) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyIdentifier("fault name"));
        }
        Ok(Self {
            name,
            fault_type,
            target_proxy: String::new(),
            attributes: Map::new(),
            toxicity: 1.0,
            active: false,
        })
    }

    /// Latency fault: `latency` delay with `jitter` variation
    pub fn latency(
        name: impl Into<String>,
        latency: Duration,
        jitter: Duration,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(name, FaultType::Latency)?
            .with_attribute("latency", millis(latency))
            .with_attribute("jitter", millis(jitter)))
    }

    /// Timeout fault: connections stall for `timeout` before closing
    pub fn timeout(name: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        Ok(Self::new(name, FaultType::Timeout)?.with_attribute("timeout", millis(timeout)))
    }

    /// Packet loss fault affecting `loss_rate` of connections
    pub fn packet_loss(name: impl Into<String>, loss_rate: f64) -> Result<Self, DomainError> {
        Self::new(name, FaultType::PacketLoss)?
            .with_attribute("timeout", 100_u64)
            .with_toxicity(loss_rate)
    }

    /// Bandwidth fault limiting throughput to `rate_kbps`
    pub fn bandwidth(name: impl Into<String>, rate_kbps: u64) -> Result<Self, DomainError> {
        Ok(Self::new(name, FaultType::Bandwidth)?.with_attribute("rate", rate_kbps))
    }

    /// Set a type-specific attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the affected fraction of connections
    pub fn with_toxicity(mut self, toxicity: f64) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&toxicity) {
            return Err(DomainError::InvalidToxicity(toxicity));
        }
        self.toxicity = toxicity;
        Ok(self)
    }

    /// Bind the fault to a proxy
    #[must_use]
    pub fn bound_to(mut self, proxy: impl Into<String>) -> Self {
        self.target_proxy = proxy.into();
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
