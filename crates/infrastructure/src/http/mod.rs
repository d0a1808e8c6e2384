//! HTTP transport with correlation support
//!
//! Workload calls go through [`HttpTransport`], which tags every outgoing
//! request with a request id (X-Request-Id) and a trace context header.

mod transport;

pub use transport::{
    HttpTransport, HttpTransportConfig, TRACEPARENT, X_REQUEST_ID, new_traceparent,
};
