//! Circuit breaker registry for calls against the target
//!
//! One breaker per [`CircuitKey`], created lazily on first use and kept for
//! the lifetime of the registry.
//!
//! # States
//!
//! - **Closed**: normal operation, calls pass through and failures are counted
//! - **Open**: the dependency is assumed down, calls are blocked
//! - **Half-Open**: a bounded number of probe calls test for recovery
//!
//! Every admission decision and every outcome is applied in one critical
//! section per key. Outcomes of calls admitted under an earlier state are
//! stale and ignored.
//!
//! # Example
//!
//! ```rust,ignore
//! use infrastructure::adapters::CircuitBreakerRegistry;
//!
//! let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default(), sink)?;
//! let guarded = breakers
//!     .guard(&key, || transport.call(request), |res| res.classify().is_retryable())
//!     .await;
//! ```

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use application::MetricsSinkPort;
use domain::{CircuitKey, CircuitState, DomainError, MetricKind, ResilienceMetricEvent};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration shared by every breaker of a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to stay open before admitting probes
    pub open_duration: Duration,
    /// Maximum number of concurrent probes while half-open
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(10),
            half_open_max_probes: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration for a sensitive dependency (opens quickly)
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(5),
            half_open_max_probes: 1,
        }
    }

    /// Creates a custom configuration
    #[must_use]
    pub const fn custom(
        failure_threshold: u32,
        open_duration: Duration,
        half_open_max_probes: u32,
    ) -> Self {
        Self {
            failure_threshold,
            open_duration,
            half_open_max_probes,
        }
    }

    /// Check the configuration bounds
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero threshold, a zero open duration
    /// or a zero probe budget.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.failure_threshold == 0 {
            return Err(DomainError::validation("failure_threshold must be > 0"));
        }
        if self.open_duration.is_zero() {
            return Err(DomainError::validation("open_duration must be > 0"));
        }
        if self.half_open_max_probes == 0 {
            return Err(DomainError::validation("half_open_max_probes must be >= 1"));
        }
        Ok(())
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub probes_in_flight: u32,
    /// Time left until probes are admitted, when open
    pub open_remaining: Option<Duration>,
}

/// Result of a guarded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The operation ran and produced a value
    Admitted(T),
    /// The circuit was open; the operation was not invoked
    Blocked,
}

impl<T> Guarded<T> {
    /// Returns true if the call was blocked
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// The produced value, if the call was admitted
    #[must_use]
    pub fn into_admitted(self) -> Option<T> {
        match self {
            Self::Admitted(value) => Some(value),
            Self::Blocked => None,
        }
    }
}

/// Mutable state of one breaker
#[derive(Debug)]
struct BreakerRecord {
    state: CircuitState,
    failure_count: u32,
    open_until: Option<Instant>,
    probes_in_flight: u32,
    /// Incremented on every transition; outcomes carry the epoch they were
    /// admitted under
    epoch: u64,
}

impl BreakerRecord {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            open_until: None,
            probes_in_flight: 0,
            epoch: 0,
        }
    }

    fn transition(&mut self, next: CircuitState) {
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
        self.epoch += 1;
    }
}

struct Breaker {
    key: CircuitKey,
    config: CircuitBreakerConfig,
    record: Mutex<BreakerRecord>,
}

enum Admission {
    Closed { epoch: u64 },
    Probe { epoch: u64, permit: ProbePermit },
    Blocked,
}

/// Half-open probe slot, released when dropped
struct ProbePermit {
    breaker: Arc<Breaker>,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        let mut record = self.breaker.record.lock();
        record.probes_in_flight = record.probes_in_flight.saturating_sub(1);
    }
}

impl Breaker {
    fn new(key: CircuitKey, config: CircuitBreakerConfig) -> Self {
        Self {
            key,
            config,
            record: Mutex::new(BreakerRecord::new()),
        }
    }

    fn admit(self: &Arc<Self>) -> Admission {
        let now = Instant::now();
        let mut record = self.record.lock();

        if record.state == CircuitState::Open {
            match record.open_until {
                Some(until) if now < until => return Admission::Blocked,
                _ => {
                    debug!(circuit = %self.key, "Circuit transitioning from Open to HalfOpen");
                    record.transition(CircuitState::HalfOpen);
                    record.open_until = None;
                },
            }
        }

        match record.state {
            CircuitState::Closed => Admission::Closed {
                epoch: record.epoch,
            },
            CircuitState::HalfOpen if record.probes_in_flight < self.config.half_open_max_probes => {
                record.probes_in_flight += 1;
                Admission::Probe {
                    epoch: record.epoch,
                    permit: ProbePermit {
                        breaker: Arc::clone(self),
                    },
                }
            },
            CircuitState::HalfOpen | CircuitState::Open => Admission::Blocked,
        }
    }

    fn on_outcome(&self, epoch: u64, failed: bool) {
        let mut record = self.record.lock();
        if record.epoch != epoch {
            debug!(circuit = %self.key, failed, "Ignoring stale outcome");
            return;
        }

        match (record.state, failed) {
            (CircuitState::Closed, false) => record.failure_count = 0,
            (CircuitState::Closed, true) => {
                record.failure_count += 1;
                if record.failure_count >= self.config.failure_threshold {
                    warn!(
                        circuit = %self.key,
                        failures = record.failure_count,
                        open_ms = self.config.open_duration.as_millis(),
                        "Circuit transitioning from Closed to Open"
                    );
                    self.open(&mut record);
                }
            },
            (CircuitState::HalfOpen, false) => {
                info!(circuit = %self.key, "Circuit transitioning from HalfOpen to Closed");
                record.transition(CircuitState::Closed);
                record.failure_count = 0;
            },
            (CircuitState::HalfOpen, true) => {
                warn!(
                    circuit = %self.key,
                    "Circuit transitioning from HalfOpen to Open after failed probe"
                );
                record.failure_count += 1;
                self.open(&mut record);
            },
            (CircuitState::Open, _) => {},
        }
    }

    fn open(&self, record: &mut BreakerRecord) {
        record.transition(CircuitState::Open);
        record.open_until = Some(Instant::now() + self.config.open_duration);
    }

    fn snapshot(&self) -> CircuitSnapshot {
        let record = self.record.lock();
        CircuitSnapshot {
            state: record.state,
            failure_count: record.failure_count,
            probes_in_flight: record.probes_in_flight,
            open_remaining: record
                .open_until
                .map(|until| until.saturating_duration_since(Instant::now())),
        }
    }
}

/// Registry of circuit breakers keyed by target
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<CircuitKey, Arc<Breaker>>>,
    sink: Arc<dyn MetricsSinkPort>,
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &self.breakers.read().len())
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of bounds.
    pub fn new(
        config: CircuitBreakerConfig,
        sink: Arc<dyn MetricsSinkPort>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            config,
            breakers: RwLock::new(HashMap::new()),
            sink,
        })
    }

    /// Returns the shared configuration
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn breaker(&self, key: &CircuitKey) -> Arc<Breaker> {
        if let Some(breaker) = self.breakers.read().get(key) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Breaker::new(key.clone(), self.config.clone()))),
        )
    }

    /// Runs `op` through the breaker for `key`
    ///
    /// When the circuit is open the operation is not invoked, a
    /// `circuit_open` event is recorded and [`Guarded::Blocked`] is returned.
    /// Otherwise the outcome is classified with `is_failure` and drives the
    /// state machine.
    pub async fn guard<T, F, Fut, P>(&self, key: &CircuitKey, op: F, is_failure: P) -> Guarded<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        P: FnOnce(&T) -> bool,
    {
        let breaker = self.breaker(key);

        let (epoch, permit) = match breaker.admit() {
            Admission::Blocked => {
                debug!(circuit = %key, "Circuit breaker preventing call");
                self.sink.record(
                    ResilienceMetricEvent::count(MetricKind::CircuitOpen)
                        .with_tag("key", key.as_str()),
                );
                return Guarded::Blocked;
            },
            Admission::Closed { epoch } => (epoch, None),
            Admission::Probe { epoch, permit } => {
                debug!(circuit = %key, "Admitting half-open probe");
                (epoch, Some(permit))
            },
        };

        let outcome = op().await;
        breaker.on_outcome(epoch, is_failure(&outcome));
        drop(permit);

        Guarded::Admitted(outcome)
    }

    /// Current state of the breaker for `key`
    ///
    /// An unknown key reports `Closed`. An open circuit whose open duration
    /// elapsed still reports `Open` until the next call observes the expiry.
    #[must_use]
    pub fn state(&self, key: &CircuitKey) -> CircuitState {
        self.snapshot(key).map_or(CircuitState::Closed, |s| s.state)
    }

    /// Snapshot of the breaker for `key`, if one was created
    #[must_use]
    pub fn snapshot(&self, key: &CircuitKey) -> Option<CircuitSnapshot> {
        let breaker = self.breakers.read().get(key).cloned();
        breaker.map(|b| b.snapshot())
    }

    /// Keys with a breaker, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<CircuitKey> {
        let mut keys: Vec<_> = self.breakers.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Discard every breaker
    pub fn clear(&self) {
        self.breakers.write().clear();
    }
}
