//! Inbound socket messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message pushed by the target over a socket connection
///
/// Frames are JSON objects tagged by `type`. Frames with a missing or
/// unrecognized tag become [`InboundMessage::Unknown`] so the timestamp is
/// still available for latency sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// Answer to a ping
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// A product changed on the server side
    ProductUpdate {
        #[serde(rename = "productId", default)]
        product_id: Option<Value>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Server-side error report
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Any other valid JSON frame
    #[serde(skip)]
    Unknown {
        kind: Option<String>,
        timestamp: Option<i64>,
    },
}

impl InboundMessage {
    /// Parse a raw text frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(value))
    }

    /// Interpret an already decoded JSON value
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timestamp = value.get("timestamp").and_then(Value::as_i64);

        serde_json::from_value(value).unwrap_or(Self::Unknown { kind, timestamp })
    }

    /// Sender timestamp in epoch milliseconds, if present
    #[must_use]
    pub const fn timestamp_ms(&self) -> Option<i64> {
        match self {
            Self::Pong { timestamp }
            | Self::ProductUpdate { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::Unknown { timestamp, .. } => *timestamp,
        }
    }

    /// Value of the `type` tag
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Pong { .. } => Some("pong"),
            Self::ProductUpdate { .. } => Some("product-update"),
            Self::Error { .. } => Some("error"),
            Self::Unknown { kind, .. } => kind.as_deref(),
        }
    }
}
