//! Cancellable periodic task
//!
//! A [`PeriodicTask`] owns at most one background worker. The worker runs
//! one cycle immediately, then one per tick, and checks for cancellation
//! only between cycles: stopping never interrupts a cycle in flight.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work executed once per tick
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// One full cycle; errors are handled inside
    async fn run_cycle(&self);
}

/// Lifecycle state of a [`PeriodicTask`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No worker
    Stopped,
    /// Worker spawned
    Running,
}

/// Per-cycle counts reported by the refresh schedulers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CycleSummary {
    /// Accounts the cycle was responsible for
    pub total: usize,
    /// Accounts updated and persisted
    pub refreshed: usize,
    /// Accounts passed over without error
    pub skipped: usize,
    /// Accounts whose upstream call or persist failed
    pub failed: usize,
}

struct Worker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop handle around one periodic worker
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    worker: Mutex<Option<Worker>>,
}

impl PeriodicTask {
    /// Create a stopped task ticking every `period`
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            worker: Mutex::new(None),
        }
    }

    /// Tick period
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.lock().is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Spawn the worker. Returns `false` if one is already running.
    pub fn start(&self, job: Arc<dyn PeriodicJob>) -> bool {
        let mut worker = self.lock();
        if worker.is_some() {
            warn!(task = self.name, "Periodic task already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_loop(job, self.period, shutdown.clone()));
        *worker = Some(Worker { shutdown, handle });

        info!(
            task = self.name,
            interval_secs = self.period.as_secs(),
            "Periodic task started"
        );
        true
    }

    /// Signal the worker and wait for it to exit. Safe to call when stopped.
    pub async fn stop(&self) {
        let Some(worker) = self.lock().take() else {
            debug!(task = self.name, "Periodic task not running");
            return;
        };

        worker.shutdown.cancel();
        if let Err(e) = worker.handle.await {
            warn!(task = self.name, error = %e, "Periodic task worker ended abnormally");
        }
        info!(task = self.name, "Periodic task stopped");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_loop(job: Arc<dyn PeriodicJob>, period: Duration, shutdown: CancellationToken) {
    run_isolated(&job).await;

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => run_isolated(&job).await,
        }
    }
    debug!(task = job.name(), "Periodic task loop exited");
}

/// Run one cycle on its own task so a panic ends only that cycle
async fn run_isolated(job: &Arc<dyn PeriodicJob>) {
    let cycle = Arc::clone(job);
    if let Err(e) = tokio::spawn(async move { cycle.run_cycle().await }).await {
        error!(task = job.name(), error = %e, "Periodic task cycle panicked");
    }
}
