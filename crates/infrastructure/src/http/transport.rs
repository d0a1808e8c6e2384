//! HTTP transport for workload calls
//!
//! Implements [`TransportPort`] over `reqwest`. Every request carries an
//! `x-request-id` header and a W3C `traceparent` header so calls can be
//! correlated on the target side. The port never fails: transport errors are
//! encoded in the returned status.

use std::time::Duration;

use application::{
    TransportErrorKind, TransportPort, TransportRequest, TransportResponse, TransportStatus,
};
use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{HeaderName, HeaderValue},
};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Header name for request correlation ID
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header name for W3C trace context
pub const TRACEPARENT: &str = "traceparent";

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout, unless the request sets its own
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            user_agent: format!("loadguard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    /// Set the default request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// `reqwest` backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Create a transport with custom configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client cannot be built.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let inner = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { inner, config })
    }

    #[must_use]
    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

/// Build a `traceparent` value with a fresh trace and span id
#[must_use]
pub fn new_traceparent() -> String {
    let trace_id = Uuid::new_v4().simple().to_string();
    let span_id = Uuid::new_v4().simple().to_string();
    format!("00-{trace_id}-{}-01", &span_id[..16])
}

fn error_kind(e: &reqwest::Error) -> TransportErrorKind {
    if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    }
}

#[async_trait]
impl TransportPort for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn call(&self, request: TransportRequest) -> TransportResponse {
        let start = Instant::now();

        let Ok(method) = Method::from_bytes(request.method.as_bytes()) else {
            warn!("Invalid HTTP method");
            return TransportResponse::error(TransportErrorKind::Other, start.elapsed());
        };

        let request_id = Uuid::now_v7();
        let mut builder = self
            .inner
            .request(method, &request.url)
            .header(X_REQUEST_ID, request_id.to_string())
            .header(TRACEPARENT, new_traceparent());

        for (name, value) in &request.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => debug!(header = %name, "Skipping invalid header"),
            }
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = error_kind(&e);
                debug!(%request_id, %kind, error = %e, "Request failed");
                return TransportResponse::error(kind, start.elapsed());
            },
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let kind = error_kind(&e);
                debug!(%request_id, %kind, error = %e, "Reading body failed");
                return TransportResponse::error(kind, start.elapsed());
            },
        };

        debug!(%request_id, status, "Request completed");
        TransportResponse::new(TransportStatus::Http(status), body, start.elapsed())
    }
}
