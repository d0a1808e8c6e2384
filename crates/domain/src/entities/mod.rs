//! Domain entities

mod chaos_fault;
mod circuit_state;
mod inbound_message;
mod metric_event;

pub use chaos_fault::{ChaosFault, FaultType};
pub use circuit_state::CircuitState;
pub use inbound_message::InboundMessage;
pub use metric_event::{Instrument, MetricKind, ResilienceMetricEvent};
