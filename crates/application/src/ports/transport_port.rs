//! Transport port
//!
//! The transport performs one request against the target. It never fails:
//! network problems are encoded in [`TransportStatus::Error`] so the
//! resilience layer can classify them like any other outcome.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use domain::CallClass;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// A request against the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method, upper case
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
    /// Per-request timeout overriding the transport default
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Create a request with the given method
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Create a POST request with a JSON body
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self::new("POST", url)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a request produced no HTTP answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The request did not complete in time
    Timeout,
    /// The connection could not be established
    Connect,
    /// Any other transport failure
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Status of a completed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    /// The target answered with an HTTP status code
    Http(u16),
    /// No answer was received
    Error(TransportErrorKind),
}

impl TransportStatus {
    /// Classify the status
    ///
    /// Transport errors and 5xx are retryable, 4xx are not, everything else
    /// is a success.
    #[must_use]
    pub const fn classify(self) -> CallClass {
        match self {
            Self::Http(code) => CallClass::from_status(code),
            Self::Error(_) => CallClass::RetryableFailure,
        }
    }

    /// HTTP status code, if any
    #[must_use]
    pub const fn code(self) -> Option<u16> {
        match self {
            Self::Http(code) => Some(code),
            Self::Error(_) => None,
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            Self::Error(kind) => write!(f, "error ({kind})"),
        }
    }
}

/// Answer of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: TransportStatus,
    pub body: String,
    pub duration: Duration,
}

impl TransportResponse {
    /// Create a response
    pub fn new(status: TransportStatus, body: impl Into<String>, duration: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            duration,
        }
    }

    /// Response carrying a transport error and no body
    #[must_use]
    pub const fn error(kind: TransportErrorKind, duration: Duration) -> Self {
        Self {
            status: TransportStatus::Error(kind),
            body: String::new(),
            duration,
        }
    }

    /// Classify the response for the resilience layer
    #[must_use]
    pub const fn classify(&self) -> CallClass {
        self.status.classify()
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Port performing requests against the target
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Perform one request
    async fn call(&self, request: TransportRequest) -> TransportResponse;
}
