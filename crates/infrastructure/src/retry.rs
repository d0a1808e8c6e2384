//! Retry policy with exponential backoff
//!
//! Re-attempts a failing operation, sleeping between attempts without
//! blocking the runtime. The backoff grows by `multiplier` after every
//! attempt, capped at `max_delay_ms`, with optional jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use infrastructure::retry::{RetryConfig, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::default(), sink)?;
//! let result = policy
//!     .execute(|| transport.call(request.clone()), |res| res.classify())
//!     .await;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use application::MetricsSinkPort;
use domain::{CallClass, DomainError, MetricKind, ResilienceMetricEvent};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 100ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for a single delay in milliseconds (default: uncapped)
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Whether to add jitter to delays (default: false)
    #[serde(default)]
    pub jitter_enabled: bool,

    /// Maximum jitter factor (0.0 to 1.0, default: 0.1 = 10%)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay() -> u64 {
    100
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: None,
            jitter_enabled: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration without jitter
    #[must_use]
    pub const fn new(max_attempts: u32, initial_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            multiplier,
            max_delay_ms: None,
            jitter_enabled: false,
            jitter_factor: 0.1,
        }
    }

    /// Configuration used for control-plane cleanup calls
    #[must_use]
    pub const fn control_plane() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: Some(2_000),
            jitter_enabled: true,
            jitter_factor: 0.1,
        }
    }

    /// Cap every delay at `max_delay_ms`
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Randomize every delay by up to `factor` in either direction
    #[must_use]
    pub const fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_enabled = true;
        self.jitter_factor = factor;
        self
    }

    /// Disable jitter
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Check the configuration bounds
    ///
    /// # Errors
    ///
    /// Returns a validation error for zero attempts, a multiplier below one or
    /// a jitter factor outside [0, 1].
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::validation("max_attempts must be >= 1"));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(DomainError::validation("multiplier must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(DomainError::validation("jitter_factor must be within [0, 1]"));
        }
        Ok(())
    }

    /// Calculate the delay after a given failed attempt (0-indexed)
    ///
    /// Uses exponential backoff: delay = initial_delay * multiplier^attempt,
    /// capped at max_delay, with optional jitter.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = (self.initial_delay_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped_delay = self
            .max_delay_ms
            .map_or(base_delay, |max| base_delay.min(max as f64));

        let final_delay = if self.jitter_enabled && self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        // Saturates for delays beyond u64 milliseconds
        Duration::from_millis(final_delay as u64)
    }
}

/// Trait for errors that can be checked for retryability
pub trait Retryable {
    /// Returns true if this error is retryable
    fn is_retryable(&self) -> bool;
}

impl Retryable for application::ApplicationError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Classify a `Result` by the retryability of its error
pub fn classify_result<T, E: Retryable>(result: &Result<T, E>) -> CallClass {
    match result {
        Ok(_) => CallClass::Success,
        Err(e) if e.is_retryable() => CallClass::RetryableFailure,
        Err(_) => CallClass::NonRetryableFailure,
    }
}

/// Final outcome of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded
    Success(T),
    /// An attempt failed permanently; no retry was made
    NonRetryable(T),
    /// Every attempt failed; carries the last outcome
    Exhausted(T),
    /// The run was cancelled; carries the last outcome, if any attempt ran
    Cancelled(Option<T>),
}

impl<T> RetryOutcome<T> {
    /// Returns true if an attempt succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The last produced value, if any
    #[must_use]
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Success(value) | Self::NonRetryable(value) | Self::Exhausted(value) => Some(value),
            Self::Cancelled(value) => value,
        }
    }
}

/// Outcome plus metadata about the attempts made
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The final outcome
    pub outcome: RetryOutcome<T>,
    /// Number of attempts made (1 = no retries, 2 = one retry, etc.)
    pub attempts: u32,
    /// Total time spent including backoff
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    /// Check if the operation succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Check if the retries were exhausted
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.outcome, RetryOutcome::Exhausted(_))
    }

    /// Check if the run was cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RetryOutcome::Cancelled(_))
    }
}

/// Exponential backoff retry loop emitting resilience events
pub struct RetryPolicy {
    config: RetryConfig,
    sink: Arc<dyn MetricsSinkPort>,
    cancel: Option<CancellationToken>,
    scope: Option<String>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Creates a policy
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of bounds.
    pub fn new(config: RetryConfig, sink: Arc<dyn MetricsSinkPort>) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            cancel: None,
            scope: None,
        })
    }

    /// Stop retrying once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Tag every emitted event with `scope`
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns the configuration
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay slept after the given failed attempt (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.config.delay_for_attempt(attempt)
    }

    /// Whether the run-level abort signal has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn emit(&self, event: ResilienceMetricEvent) {
        let event = match &self.scope {
            Some(scope) => event.with_tag("scope", scope.clone()),
            None => event,
        };
        self.sink.record(event);
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts or the run is cancelled
    ///
    /// `classify` decides for each produced value whether it is a success, a
    /// retryable failure or a permanent failure.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn execute<T, F, Fut, C>(&self, mut operation: F, classify: C) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        C: Fn(&T) -> CallClass,
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last: Option<T> = None;

        loop {
            if self.is_cancelled() {
                debug!(attempts, "Retry loop cancelled before attempt");
                return RetryResult {
                    outcome: RetryOutcome::Cancelled(last),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }

            attempts += 1;
            let value = operation().await;

            match classify(&value) {
                CallClass::Success => {
                    if attempts > 1 {
                        let elapsed = start.elapsed();
                        debug!(
                            attempts,
                            duration_ms = elapsed.as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                        self.emit(ResilienceMetricEvent::new(
                            MetricKind::RecoveryTime,
                            elapsed.as_secs_f64() * 1000.0,
                        ));
                        self.emit(ResilienceMetricEvent::count(MetricKind::SuccessAfterRetry));
                    }
                    return RetryResult {
                        outcome: RetryOutcome::Success(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                },
                CallClass::NonRetryableFailure => {
                    debug!(attempts, "Operation failed with non-retryable outcome");
                    return RetryResult {
                        outcome: RetryOutcome::NonRetryable(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                },
                CallClass::RetryableFailure => {},
            }

            if attempts >= self.config.max_attempts {
                warn!(
                    attempts,
                    max_attempts = self.config.max_attempts,
                    "Operation failed after max attempts"
                );
                return RetryResult {
                    outcome: RetryOutcome::Exhausted(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            }

            let delay = self.config.delay_for_attempt(attempts - 1);
            warn!(
                attempt = attempts,
                max_attempts = self.config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Operation failed, retrying"
            );
            self.emit(
                ResilienceMetricEvent::count(MetricKind::Retry)
                    .with_tag("attempt", attempts.to_string()),
            );
            last = Some(value);

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => {},
                        () = tokio::time::sleep(delay) => {},
                    }
                },
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}
