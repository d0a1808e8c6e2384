//! Port definitions for the application layer
//!
//! Ports are interfaces that define how the resilience core interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod chaos_control_port;
mod metrics_port;
mod transport_port;

#[cfg(test)]
pub use chaos_control_port::MockChaosControlPort;
pub use chaos_control_port::ChaosControlPort;
#[cfg(test)]
pub use metrics_port::MockMetricsSinkPort;
pub use metrics_port::MetricsSinkPort;
#[cfg(test)]
pub use transport_port::MockTransportPort;
pub use transport_port::{
    TransportErrorKind, TransportPort, TransportRequest, TransportResponse, TransportStatus,
};
