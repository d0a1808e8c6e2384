//! Run-scoped lifecycle
//!
//! A [`RunScope`] is created at setup and threaded through the workload. It
//! carries the run id and the run-level abort signal, and owns teardown:
//! whatever way the workload ends, every fault injected through the chaos
//! controller is drained before the report is returned.

use std::{
    any::Any,
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{signal, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::chaos::{ChaosController, ChaosError};

/// How the workload ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd<T> {
    /// The workload ran to completion
    Completed(T),
    /// The run was aborted before the workload completed
    Aborted,
    /// The workload panicked; carries the panic message
    Panicked(String),
}

/// Result of a scoped run
#[derive(Debug)]
pub struct RunReport<T> {
    pub run_id: Uuid,
    pub end: RunEnd<T>,
    pub duration: Duration,
    /// Outcome of the unconditional chaos drain
    pub drain: Result<(), ChaosError>,
}

impl<T> RunReport<T> {
    /// Returns true if the workload completed and every fault was removed
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self.end, RunEnd::Completed(_)) && self.drain.is_ok()
    }
}

/// Context of one load run, from setup through teardown
pub struct RunScope {
    run_id: Uuid,
    token: CancellationToken,
    chaos: Arc<ChaosController>,
    drained: AtomicBool,
}

impl fmt::Debug for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunScope")
            .field("run_id", &self.run_id)
            .field("aborted", &self.token.is_cancelled())
            .field("drained", &self.drained.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl RunScope {
    /// Opens a scope with a fresh run id
    #[must_use]
    pub fn new(chaos: Arc<ChaosController>) -> Self {
        let run_id = Uuid::now_v7();
        info!(%run_id, "Run scope opened");
        Self {
            run_id,
            token: CancellationToken::new(),
            chaos,
            drained: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Abort signal observed by retry policies and the run loop
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The chaos controller drained at teardown
    #[must_use]
    pub fn chaos(&self) -> &Arc<ChaosController> {
        &self.chaos
    }

    /// Signal the run to stop
    pub fn abort(&self) {
        if !self.token.is_cancelled() {
            warn!(run_id = %self.run_id, "Run aborted");
            self.token.cancel();
        }
    }

    /// Run `workload` to completion or until the scope is aborted
    pub async fn run<F, T>(&self, workload: F) -> RunReport<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_until(workload, std::future::pending()).await
    }

    /// Run `workload`, aborting when `interrupt` resolves first
    ///
    /// Teardown always happens: the chaos controller is drained whether the
    /// workload completed, was aborted or panicked.
    #[allow(clippy::cast_possible_truncation)]
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub async fn run_until<F, T, I>(&self, workload: F, interrupt: I) -> RunReport<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        I: Future<Output = ()>,
    {
        let start = Instant::now();
        let mut handle = tokio::spawn(workload);

        let end = tokio::select! {
            joined = &mut handle => match joined {
                Ok(value) => RunEnd::Completed(value),
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!(%message, "Workload panicked");
                    RunEnd::Panicked(message)
                },
                Err(_) => RunEnd::Aborted,
            },
            () = self.token.cancelled() => {
                stop(&mut handle).await;
                RunEnd::Aborted
            },
            () = interrupt => {
                self.abort();
                stop(&mut handle).await;
                RunEnd::Aborted
            },
        };

        let drain = self.teardown().await;
        let duration = start.elapsed();

        match (&end, &drain) {
            (RunEnd::Completed(_), Ok(())) => {
                info!(duration_ms = duration.as_millis() as u64, "Run completed");
            },
            (_, Err(e)) => error!(error = %e, "Run ended with residual faults"),
            _ => warn!(duration_ms = duration.as_millis() as u64, "Run ended early"),
        }

        RunReport {
            run_id: self.run_id,
            end,
            duration,
            drain,
        }
    }

    /// Remove every injected fault
    pub async fn teardown(&self) -> Result<(), ChaosError> {
        let result = self.chaos.drain_all().await;
        self.drained.store(true, Ordering::Release);
        result
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        if self.drained.load(Ordering::Acquire) {
            return;
        }
        warn!(run_id = %self.run_id, "Run scope dropped without teardown, draining faults");
        self.token.cancel();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let chaos = Arc::clone(&self.chaos);
                runtime.spawn(async move {
                    if let Err(e) = chaos.drain_all().await {
                        error!(error = %e, "Drain after dropped run scope failed");
                    }
                });
            },
            Err(_) => error!(
                run_id = %self.run_id,
                "No runtime available, injected faults may remain"
            ),
        }
    }
}

/// Abort the workload and wait until it no longer runs
async fn stop<T>(handle: &mut JoinHandle<T>) {
    handle.abort();
    if handle.await.is_err_and(|e| e.is_panic()) {
        warn!("Workload panicked while being aborted");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// Pass to [`RunScope::run_until`] so an external interrupt aborts the run
/// and still drains injected faults.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, aborting run"),
        () = terminate => info!("Received SIGTERM, aborting run"),
    }
}
