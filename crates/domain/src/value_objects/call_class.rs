//! Classification of a single call outcome

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the resilience layer should treat one operation outcome
///
/// Timeouts, connection errors and 5xx answers are retryable failures.
/// 4xx answers are non-retryable: they are surfaced immediately and do not
/// count against the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallClass {
    /// The dependency answered successfully
    Success,
    /// Transient failure worth retrying
    RetryableFailure,
    /// Permanent failure (client-side error)
    NonRetryableFailure,
}

impl CallClass {
    /// Classify an HTTP-style status code
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400..=499 => Self::NonRetryableFailure,
            500..=599 => Self::RetryableFailure,
            _ => Self::Success,
        }
    }

    /// Returns true for successful outcomes
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for any failure
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !self.is_success()
    }

    /// Returns true if another attempt may succeed
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RetryableFailure)
    }
}

impl fmt::Display for CallClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::RetryableFailure => write!(f, "retryable_failure"),
            Self::NonRetryableFailure => write!(f, "non_retryable_failure"),
        }
    }
}
