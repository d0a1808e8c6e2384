//! Domain layer for the resilience core
//!
//! Contains the vocabulary shared by every layer: circuit keys and states,
//! outcome classification, chaos faults, metric events and inbound socket
//! messages. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
