//! Toxiproxy control plane client
//!
//! HTTP client for the Toxiproxy admin API: faults are "toxics" created on
//! and deleted from named proxies.

use std::time::Duration;

use application::{ApplicationError, ChaosControlPort};
use async_trait::async_trait;
use domain::ChaosFault;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Toxiproxy client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToxiproxyConfig {
    /// Admin API base URL (default: <http://localhost:8474>)
    pub base_url: String,
    /// Timeout for one control plane request
    pub timeout: Duration,
}

impl Default for ToxiproxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8474".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Request body for toxic creation
#[derive(Debug, Serialize)]
struct ToxicBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    toxic_type: &'static str,
    stream: &'static str,
    toxicity: f64,
    attributes: &'a Map<String, Value>,
}

impl<'a> From<&'a ChaosFault> for ToxicBody<'a> {
    fn from(fault: &'a ChaosFault) -> Self {
        Self {
            name: &fault.name,
            toxic_type: fault.fault_type.wire_type(),
            stream: "downstream",
            toxicity: fault.toxicity,
            attributes: &fault.attributes,
        }
    }
}

/// Toxiproxy admin API client
#[derive(Debug, Clone)]
pub struct ToxiproxyClient {
    client: Client,
    base: Url,
}

impl ToxiproxyClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path or the HTTP
    /// client cannot be built.
    pub fn new(config: &ToxiproxyConfig) -> Result<Self, ApplicationError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ApplicationError::Configuration(format!("Toxiproxy URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApplicationError::Configuration(format!(
                "Toxiproxy URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApplicationError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    /// Base URL of the admin API
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// URL below the base with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ApplicationError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ApplicationError::Configuration(format!(
                    "Toxiproxy URL cannot carry a path: {}",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn toxics_url(&self, proxy: &str) -> Result<Url, ApplicationError> {
        self.url(&["proxies", proxy, "toxics"])
    }

    fn toxic_url(&self, proxy: &str, name: &str) -> Result<Url, ApplicationError> {
        self.url(&["proxies", proxy, "toxics", name])
    }
}

fn send_error(e: &reqwest::Error) -> ApplicationError {
    if e.is_timeout() {
        return ApplicationError::Transport(format!("control plane timed out: {e}"));
    }
    ApplicationError::Transport(format!("control plane unreachable: {e}"))
}

/// Accept only the status the admin API documents for the operation
async fn expect_status(response: Response, expected: StatusCode) -> Result<(), ApplicationError> {
    let status = response.status();
    if status == expected {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApplicationError::control_plane(status.as_u16(), message))
}

#[async_trait]
impl ChaosControlPort for ToxiproxyClient {
    #[instrument(skip(self, fault), fields(toxic = %fault.name, kind = %fault.fault_type))]
    async fn create_toxic(&self, proxy: &str, fault: &ChaosFault) -> Result<(), ApplicationError> {
        let response = self
            .client
            .post(self.toxics_url(proxy)?)
            .json(&ToxicBody::from(fault))
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        debug!(status = response.status().as_u16(), "Create toxic answered");
        expect_status(response, StatusCode::OK).await
    }

    #[instrument(skip(self))]
    async fn delete_toxic(&self, proxy: &str, name: &str) -> Result<(), ApplicationError> {
        let response = self
            .client
            .delete(self.toxic_url(proxy, name)?)
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        debug!(status = response.status().as_u16(), "Delete toxic answered");
        expect_status(response, StatusCode::NO_CONTENT).await
    }
}
