//! Chaos controller
//!
//! Injects and removes faults through the control plane and keeps a registry
//! of every fault it created, so that [`ChaosController::drain_all`] can
//! remove them at run end whatever happened during the run.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use application::{ApplicationError, ChaosControlPort, MetricsSinkPort};
use domain::{CallClass, ChaosFault, DomainError, MetricKind, ResilienceMetricEvent};
use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::retry::{RetryConfig, RetryPolicy, classify_result};

/// Errors reported by the chaos controller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChaosError {
    /// Faults that could not be removed at teardown
    #[error("{} fault(s) could not be removed: {}", .0.len(), .0.join(", "))]
    ResidualFaults(Vec<String>),
}

/// Chaos controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosControllerConfig {
    /// Retry behaviour for fault removal
    pub removal_retry: RetryConfig,
}

impl Default for ChaosControllerConfig {
    fn default() -> Self {
        Self {
            removal_retry: RetryConfig::control_plane(),
        }
    }
}

/// Registry key: proxy name and fault name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct FaultKey {
    proxy: String,
    name: String,
}

impl FaultKey {
    fn new(proxy: &str, name: &str) -> Self {
        Self {
            proxy: proxy.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for FaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.proxy, self.name)
    }
}

/// Pending removal of a time-boxed fault
struct TimeBox {
    id: u64,
    handle: JoinHandle<()>,
}

/// Coordinates fault injection against the control plane
pub struct ChaosController {
    port: Arc<dyn ChaosControlPort>,
    sink: Arc<dyn MetricsSinkPort>,
    removal: RetryPolicy,
    faults: Mutex<BTreeMap<FaultKey, ChaosFault>>,
    locks: Mutex<HashMap<FaultKey, Arc<tokio::sync::Mutex<()>>>>,
    timers: Mutex<HashMap<FaultKey, TimeBox>>,
    next_time_box: AtomicU64,
}

impl fmt::Debug for ChaosController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaosController")
            .field("active", &self.faults.lock().len())
            .field("removal", &self.removal)
            .finish_non_exhaustive()
    }
}

/// The control plane refused the fault outright, so nothing was created
const fn is_rejection(error: &ApplicationError) -> bool {
    matches!(error, ApplicationError::ControlPlane { status, .. } if *status >= 400 && *status < 500)
}

/// Deletion is confirmed when the control plane deleted the fault or never
/// had it
fn classify_removal(result: &Result<(), ApplicationError>) -> CallClass {
    match result {
        Err(e) if e.is_not_found() => CallClass::Success,
        other => classify_result(other),
    }
}

impl ChaosController {
    /// Create a controller
    ///
    /// Removal retries never observe the run's abort signal: cleanup must
    /// still happen after an abort.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal retry configuration is out of bounds.
    pub fn new(
        port: Arc<dyn ChaosControlPort>,
        sink: Arc<dyn MetricsSinkPort>,
        config: ChaosControllerConfig,
    ) -> Result<Self, DomainError> {
        let removal =
            RetryPolicy::new(config.removal_retry, Arc::clone(&sink))?.with_scope("chaos");
        Ok(Self {
            port,
            sink,
            removal,
            faults: Mutex::new(BTreeMap::new()),
            locks: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            next_time_box: AtomicU64::new(0),
        })
    }

    fn key_lock(&self, key: &FaultKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key.clone()).or_default())
    }

    fn cancel_time_box(&self, key: &FaultKey) {
        if let Some(time_box) = self.timers.lock().remove(key) {
            time_box.handle.abort();
        }
    }

    /// Inject `fault` on `proxy`
    ///
    /// Replaces any fault of the same name on the same proxy, cancelling the
    /// time box of the replaced fault. Returns whether the control plane
    /// acknowledged the creation; failures are logged and never abort the
    /// run.
    ///
    /// The fault is registered before the control plane is asked to create
    /// it and stays registered unless the control plane rejects it, so a
    /// drain covers an injection that was interrupted mid-flight.
    #[instrument(skip(self, fault), fields(toxic = %fault.name, kind = %fault.fault_type))]
    pub async fn inject(&self, proxy: &str, fault: ChaosFault) -> bool {
        let key = FaultKey::new(proxy, &fault.name);
        let lock = self.key_lock(&key);
        let _serial = lock.lock().await;
        self.cancel_time_box(&key);

        let registered = self.faults.lock().contains_key(&key);
        if registered && !self.remove_locked(&key).await {
            warn!("Could not replace existing fault");
            return false;
        }

        let mut fault = fault.bound_to(proxy);
        fault.active = false;
        self.faults.lock().insert(key.clone(), fault.clone());

        let result = match self.port.create_toxic(proxy, &fault).await {
            Err(e) if e.is_conflict() => {
                debug!("Fault left over on control plane, recreating");
                match self.port.delete_toxic(proxy, &fault.name).await {
                    Ok(()) => self.port.create_toxic(proxy, &fault).await,
                    Err(e) if e.is_not_found() => self.port.create_toxic(proxy, &fault).await,
                    Err(e) => {
                        // the leftover is still on the control plane
                        warn!(error = %e, "Could not clear leftover fault");
                        return false;
                    },
                }
            },
            other => other,
        };

        match result {
            Ok(()) => {
                fault.active = true;
                info!("Injected fault");
                self.sink.record(
                    ResilienceMetricEvent::count(MetricKind::ChaosInjected)
                        .with_tag("type", fault.fault_type.as_str())
                        .with_tag("proxy", proxy),
                );
                self.faults.lock().insert(key, fault);
                true
            },
            Err(e) if is_rejection(&e) => {
                warn!(error = %e, "Control plane rejected fault");
                self.faults.lock().remove(&key);
                false
            },
            Err(e) => {
                warn!(error = %e, "Fault injection outcome unknown");
                false
            },
        }
    }

    /// Inject `fault` on `proxy` and remove it again after `ttl`
    ///
    /// The fault stays in the registry until removed, so an earlier
    /// [`drain_all`](Self::drain_all) still covers it. Replacing or removing
    /// the fault before `ttl` elapses cancels the time box.
    pub async fn inject_for(
        self: &Arc<Self>,
        proxy: &str,
        fault: ChaosFault,
        ttl: Duration,
    ) -> bool {
        let key = FaultKey::new(proxy, &fault.name);
        if !self.inject(proxy, fault).await {
            return false;
        }

        let id = self.next_time_box.fetch_add(1, Ordering::Relaxed);
        let controller = Arc::clone(self);
        let expiring = key.clone();

        let mut timers = self.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            controller.expire(&expiring, id).await;
        });
        if let Some(previous) = timers.insert(key, TimeBox { id, handle }) {
            previous.handle.abort();
        }
        true
    }

    /// Remove a time-boxed fault unless its time box was superseded
    async fn expire(&self, key: &FaultKey, id: u64) {
        let lock = self.key_lock(key);
        let _serial = lock.lock().await;

        let current = {
            let mut timers = self.timers.lock();
            if timers.get(key).is_some_and(|time_box| time_box.id == id) {
                timers.remove(key);
                true
            } else {
                false
            }
        };

        if current {
            debug!(fault = %key, "Fault time box elapsed");
            self.remove_locked(key).await;
        }
    }

    /// Remove the fault called `name` from `proxy`
    ///
    /// Retried with capped backoff on transient failures. The registry entry
    /// is dropped only once deletion is confirmed; a fault the control plane
    /// does not know counts as deleted.
    #[instrument(skip(self))]
    pub async fn remove(&self, proxy: &str, name: &str) -> bool {
        let key = FaultKey::new(proxy, name);
        let lock = self.key_lock(&key);
        let _serial = lock.lock().await;
        self.remove_locked(&key).await
    }

    async fn remove_locked(&self, key: &FaultKey) -> bool {
        self.cancel_time_box(key);
        let result = self
            .removal
            .execute(
                || self.port.delete_toxic(&key.proxy, &key.name),
                classify_removal,
            )
            .await;

        if result.is_success() {
            self.faults.lock().remove(key);
            info!(fault = %key, attempts = result.attempts, "Removed fault");
            true
        } else {
            let error = result
                .outcome
                .into_inner()
                .and_then(Result::err)
                .map(|e| e.to_string())
                .unwrap_or_default();
            warn!(fault = %key, attempts = result.attempts, error = %error, "Failed to remove fault");
            false
        }
    }

    /// Remove every registered fault
    ///
    /// Individual failures are logged; faults that could not be removed stay
    /// registered and are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`ChaosError::ResidualFaults`] naming every fault still
    /// registered afterwards.
    pub async fn drain_all(&self) -> Result<(), ChaosError> {
        for (_, time_box) in self.timers.lock().drain() {
            time_box.handle.abort();
        }

        let keys: Vec<FaultKey> = self.faults.lock().keys().cloned().collect();
        if keys.is_empty() {
            debug!("No faults to drain");
            return Ok(());
        }

        info!(count = keys.len(), "Draining faults");
        join_all(keys.iter().map(|key| self.remove(&key.proxy, &key.name))).await;

        let residual: Vec<String> = self.faults.lock().keys().map(ToString::to_string).collect();
        if residual.is_empty() {
            info!("All faults removed");
            Ok(())
        } else {
            error!(faults = ?residual, "Faults left on control plane");
            Err(ChaosError::ResidualFaults(residual))
        }
    }

    /// Registered faults ordered by proxy and name
    #[must_use]
    pub fn active_faults(&self) -> Vec<ChaosFault> {
        self.faults.lock().values().cloned().collect()
    }

    /// Whether a fault called `name` is registered on `proxy`
    #[must_use]
    pub fn is_active(&self, proxy: &str, name: &str) -> bool {
        self.faults.lock().contains_key(&FaultKey::new(proxy, name))
    }
}
