//! Infrastructure adapters
//!
//! Guards around outbound calls: the per-key circuit breaker registry and
//! the fallback provider consulted when a call cannot be served live.

mod circuit_breaker;
mod fallback;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, Guarded};
pub use fallback::{
    FallbackConfig, FallbackProvider, FallbackReason, SubstituteData, SubstituteOrigin,
    default_products,
};
