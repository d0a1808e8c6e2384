//! Value Objects - Immutable, identity-less domain primitives

mod call_class;
mod circuit_key;

pub use call_class::CallClass;
pub use circuit_key::CircuitKey;
