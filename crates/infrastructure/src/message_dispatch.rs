//! Inbound socket message dispatch
//!
//! Single entry point for frames pushed by the target over a socket: each
//! frame is counted, parsed into an [`InboundMessage`] and, when it carries
//! a sender timestamp, sampled for delivery latency.

use std::sync::Arc;

use application::MetricsSinkPort;
use domain::{InboundMessage, MetricKind, ResilienceMetricEvent};
use tracing::{debug, warn};

/// Result of dispatching one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The frame was understood
    Handled {
        message: InboundMessage,
        /// Delivery latency in milliseconds, when the frame was timestamped
        latency_ms: Option<f64>,
    },
    /// The frame was not valid JSON
    Malformed { reason: String },
}

impl Dispatch {
    /// The parsed message, if any
    #[must_use]
    pub const fn message(&self) -> Option<&InboundMessage> {
        match self {
            Self::Handled { message, .. } => Some(message),
            Self::Malformed { .. } => None,
        }
    }
}

/// Parses inbound frames and records socket metrics
pub struct MessageDispatcher {
    sink: Arc<dyn MetricsSinkPort>,
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher").finish_non_exhaustive()
    }
}

impl MessageDispatcher {
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSinkPort>) -> Self {
        Self { sink }
    }

    /// Dispatch a frame received now
    pub fn dispatch(&self, raw: &str) -> Dispatch {
        self.dispatch_at(raw, chrono::Utc::now().timestamp_millis())
    }

    /// Dispatch a frame received at `now_ms` (epoch milliseconds)
    #[allow(clippy::cast_precision_loss)]
    pub fn dispatch_at(&self, raw: &str, now_ms: i64) -> Dispatch {
        self.sink
            .record(ResilienceMetricEvent::count(MetricKind::WsMessagesReceived));

        let message = match InboundMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Malformed socket frame");
                return Dispatch::Malformed {
                    reason: e.to_string(),
                };
            },
        };

        let latency_ms = message.timestamp_ms().and_then(|sent| {
            match now_ms.checked_sub(sent).filter(|latency| *latency >= 0) {
                Some(latency) => Some(latency as f64),
                None => {
                    debug!(sent, "Sender timestamp out of range, skipping latency sample");
                    None
                },
            }
        });

        if let Some(latency) = latency_ms {
            self.sink
                .record(ResilienceMetricEvent::new(MetricKind::WsMessageLatency, latency));
        }

        match &message {
            InboundMessage::Error { error, .. } => {
                warn!(error = error.as_deref().unwrap_or("unspecified"), "Server reported an error");
            },
            InboundMessage::ProductUpdate { product_id, .. } => {
                debug!(?product_id, "Product update received");
            },
            InboundMessage::Pong { .. } => debug!("Pong received"),
            InboundMessage::Unknown { kind, .. } => {
                debug!(kind = kind.as_deref().unwrap_or("none"), "Unhandled message type");
            },
        }

        Dispatch::Handled {
            message,
            latency_ms,
        }
    }
}
