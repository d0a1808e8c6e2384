//! Resilient call composition
//!
//! Wraps one workload call in the full resilience chain: the circuit breaker
//! for the key guards a retry loop around the operation, and the fallback
//! provider answers whenever the call cannot be served live.
//!
//! ```text
//! breaker(key) ─┬─ blocked ──────────────────────────► fallback(circuit_open)
//!               └─ admitted ─► retry(op) ─┬─ success ─► Live
//!                                         ├─ 4xx ─────► Rejected
//!                                         ├─ exhausted► fallback(retries_exhausted)
//!                                         └─ cancelled► Aborted
//! ```

use std::{fmt, future::Future, sync::Arc};

use application::MetricsSinkPort;
use domain::{CallClass, CircuitKey, MetricKind, ResilienceMetricEvent};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    adapters::{CircuitBreakerRegistry, FallbackProvider, FallbackReason, Guarded, SubstituteData},
    retry::{RetryOutcome, RetryPolicy, RetryResult},
};

/// What a resilient call produced
#[derive(Debug, Clone, PartialEq)]
pub enum ResilientOutcome<T> {
    /// A live attempt succeeded, possibly after retries
    Live(T),
    /// The dependency answered with a permanent failure
    Rejected(T),
    /// The call could not be served live; substitute data was supplied
    Substituted {
        data: SubstituteData,
        reason: FallbackReason,
    },
    /// The run was cancelled while the call was in progress
    Aborted,
}

impl<T> ResilientOutcome<T> {
    /// Returns true for a live result
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Returns true if fallback data was supplied
    #[must_use]
    pub const fn is_substituted(&self) -> bool {
        matches!(self, Self::Substituted { .. })
    }

    /// The fallback reason, if substitute data was supplied
    #[must_use]
    pub const fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Substituted { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Breaker, retry and fallback composed around workload calls
#[derive(Clone)]
pub struct ResilientCall {
    breakers: Arc<CircuitBreakerRegistry>,
    retry: Arc<RetryPolicy>,
    fallback: Arc<FallbackProvider>,
    sink: Arc<dyn MetricsSinkPort>,
}

impl fmt::Debug for ResilientCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientCall")
            .field("breakers", &self.breakers)
            .field("retry", &self.retry)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl ResilientCall {
    #[must_use]
    pub fn new(
        breakers: Arc<CircuitBreakerRegistry>,
        retry: Arc<RetryPolicy>,
        fallback: Arc<FallbackProvider>,
        sink: Arc<dyn MetricsSinkPort>,
    ) -> Self {
        Self {
            breakers,
            retry,
            fallback,
            sink,
        }
    }

    /// The breaker registry used by this call chain
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// The fallback provider used by this call chain
    #[must_use]
    pub fn fallback(&self) -> &Arc<FallbackProvider> {
        &self.fallback
    }

    /// Run `operation` for `key` through breaker, retry and fallback
    ///
    /// `classify` decides per produced value whether it is a success, a
    /// retryable failure or a permanent failure.
    #[instrument(skip_all, fields(circuit = %key))]
    pub async fn call<T, F, Fut, C>(
        &self,
        key: &CircuitKey,
        operation: F,
        classify: C,
    ) -> ResilientOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        C: Fn(&T) -> CallClass,
    {
        if self.retry.is_cancelled() {
            debug!("Run already aborted, skipping call");
            return ResilientOutcome::Aborted;
        }

        // Only a cancellation that interrupted a live attempt counts against
        // the dependency.
        let guarded = self
            .breakers
            .guard(
                key,
                || self.retry.execute(operation, &classify),
                |result: &RetryResult<T>| {
                    result.is_exhausted()
                        || matches!(result.outcome, RetryOutcome::Cancelled(Some(_)))
                },
            )
            .await;

        let result = match guarded {
            Guarded::Blocked => {
                return self.substitute(key, FallbackReason::CircuitOpen).await;
            },
            Guarded::Admitted(result) => result,
        };

        match result.outcome {
            RetryOutcome::Success(value) => {
                self.record_outcome(key, true);
                ResilientOutcome::Live(value)
            },
            RetryOutcome::NonRetryable(value) => {
                debug!(attempts = result.attempts, "Dependency rejected the call");
                ResilientOutcome::Rejected(value)
            },
            RetryOutcome::Exhausted(_) => {
                self.record_outcome(key, false);
                self.substitute(key, FallbackReason::RetriesExhausted).await
            },
            RetryOutcome::Cancelled(_) => {
                debug!(attempts = result.attempts, "Call aborted by run cancellation");
                ResilientOutcome::Aborted
            },
        }
    }

    /// Like [`call`](Self::call), remembering live results as fallback data
    ///
    /// `project` turns a live value into the JSON the fallback provider
    /// should serve for `key` later; returning `None` skips remembering.
    pub async fn call_cached<T, F, Fut, C, P>(
        &self,
        key: &CircuitKey,
        operation: F,
        classify: C,
        project: P,
    ) -> ResilientOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        C: Fn(&T) -> CallClass,
        P: FnOnce(&T) -> Option<Value>,
    {
        let outcome = self.call(key, operation, classify).await;
        if let ResilientOutcome::Live(value) = &outcome {
            if let Some(data) = project(value) {
                self.fallback.remember(key, data).await;
            }
        }
        outcome
    }

    async fn substitute<T>(&self, key: &CircuitKey, reason: FallbackReason) -> ResilientOutcome<T> {
        let data = self.fallback.supply(key, reason).await;
        ResilientOutcome::Substituted { data, reason }
    }

    fn record_outcome(&self, key: &CircuitKey, live: bool) {
        self.sink.record(
            ResilienceMetricEvent::rate(MetricKind::ResilienceOutcome, live)
                .with_tag("key", key.as_str()),
        );
    }
}
