//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The transport could not complete a call
    #[error("Transport error: {0}")]
    Transport(String),

    /// The fault-injection control plane answered with an unexpected status
    #[error("Control plane returned {status}: {message}")]
    ControlPlane { status: u16, message: String },

    /// External service error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The run was aborted
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Create a control plane error
    pub fn control_plane(status: u16, message: impl Into<String>) -> Self {
        Self::ControlPlane {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Transport failures and 5xx answers from the control plane are
    /// transient; everything else is permanent.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ExternalService(_) => true,
            Self::ControlPlane { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the control plane reported `404 Not Found`
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ControlPlane { status: 404, .. })
    }

    /// Check if the control plane reported `409 Conflict`
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ControlPlane { status: 409, .. })
    }
}
