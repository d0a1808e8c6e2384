//! Chaos engineering against the target's network path.
//!
//! Faults are injected through a Toxiproxy-style control plane sitting
//! between the load generator and the target.
//!
//! # Overview
//!
//! - `ChaosController`: injects and removes faults, keeps a registry of
//!   active faults and drains it at run end
//! - `ToxiproxyClient`: `ChaosControlPort` adapter for the Toxiproxy admin API
//!
//! # Example
//!
//! ```ignore
//! use infrastructure::chaos::{ChaosController, ToxiproxyClient, ToxiproxyConfig};
//!
//! let client = Arc::new(ToxiproxyClient::new(&ToxiproxyConfig::default())?);
//! let chaos = Arc::new(ChaosController::new(client, sink, Default::default())?);
//!
//! let fault = ChaosFault::latency("latency_toxic", Duration::from_secs(1), Duration::from_millis(500))?;
//! chaos.inject("shopstack-api", fault).await;
//! // ...
//! chaos.drain_all().await?;
//! ```

mod controller;
mod toxiproxy_client;

pub use controller::{ChaosController, ChaosControllerConfig, ChaosError};
pub use toxiproxy_client::{ToxiproxyClient, ToxiproxyConfig};
