//! Infrastructure layer - resilience components and adapters
//!
//! Implements the ports defined in the application layer and hosts the
//! resilience machinery: the circuit breaker registry, the retry policy, the
//! fallback provider, the chaos controller and the metrics sinks, composed by
//! [`ResilientCall`] and scoped to a run by [`RunScope`].

pub mod adapters;
pub mod chaos;
pub mod config;
pub mod http;
pub mod message_dispatch;
pub mod metrics;
pub mod resilient_call;
pub mod retry;
pub mod run_scope;
pub mod telemetry;

pub use adapters::*;
pub use chaos::{ChaosController, ChaosControllerConfig, ChaosError, ToxiproxyClient, ToxiproxyConfig};
pub use crate::config::{ConfigError, ResilienceConfig};
pub use http::{HttpTransport, HttpTransportConfig, TRACEPARENT, X_REQUEST_ID};
pub use message_dispatch::{Dispatch, MessageDispatcher};
pub use crate::metrics::{FanoutSink, PrometheusSink, RecordingSink};
pub use resilient_call::{ResilientCall, ResilientOutcome};
pub use retry::{
    RetryConfig, RetryOutcome, RetryPolicy, RetryResult, Retryable, classify_result,
};
pub use run_scope::{RunEnd, RunReport, RunScope, shutdown_signal};
pub use telemetry::{TelemetryConfig, TelemetryError, init_tracing, install_prometheus_exporter};
