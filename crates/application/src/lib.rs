//! Application layer - ports and errors of the resilience core
//!
//! Defines how the resilience components reach the outside world: the
//! transport used by workload calls, the fault-injection control plane and
//! the metrics backend. Adapters in the infrastructure layer implement these
//! ports.

pub mod error;
pub mod ports;

pub use error::ApplicationError;
pub use ports::*;
