//! Fault-injection control plane port
//!
//! A Toxiproxy-style control plane manages named faults ("toxics") on named
//! proxies sitting in the network path of the target.

use async_trait::async_trait;
use domain::ChaosFault;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for creating and deleting faults on the control plane
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChaosControlPort: Send + Sync {
    /// Create `fault` on `proxy`
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::ControlPlane`] for non-success answers
    /// (`409` when a fault with the same name already exists) and
    /// [`ApplicationError::Transport`] when the control plane is unreachable.
    async fn create_toxic(&self, proxy: &str, fault: &ChaosFault) -> Result<(), ApplicationError>;

    /// Delete the fault called `name` from `proxy`
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::ControlPlane`] with status `404` when the
    /// fault does not exist.
    async fn delete_toxic(&self, proxy: &str, name: &str) -> Result<(), ApplicationError>;
}
