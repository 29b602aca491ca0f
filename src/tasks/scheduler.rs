//! Background Scheduler
//!
//! Small dedicated worker pool that runs recurring and one-off cache
//! maintenance jobs: expiration sweeps, refresh sweeps, write-back flushes and
//! asynchronous initial loads.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{CacheError, Result};

/// A unit of work run on every tick of a recurring task.
pub type Job = Arc<dyn Fn() -> Result<()> + Send + Sync>;

// == Task Handle ==
/// Handle to a task spawned on the [`Scheduler`].
#[derive(Debug)]
pub struct TaskHandle {
    name: Arc<str>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the task. A tick already in progress runs to completion.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// == Scheduler ==
/// Worker pool shared by every policy of one or more caches.
///
/// A job that returns an error or panics is logged and the task keeps its
/// schedule; neither the task nor the pool is torn down.
///
/// # Example
/// ```ignore
/// let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default())?);
/// let handle = scheduler.schedule_at_fixed_rate("tick", period, period, job)?;
/// // Later, once, from the host application:
/// scheduler.shutdown();
/// ```
pub struct Scheduler {
    /// `None` once shut down
    runtime: Mutex<Option<Runtime>>,
    /// Broadcasts `true` to every recurring loop on shutdown
    shutdown_tx: watch::Sender<bool>,
    /// How long shutdown waits for in-flight work
    grace: Duration,
}

impl Scheduler {
    // == Constructor ==
    /// Starts the worker pool described by `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(CacheError::InvalidConfig(
                "Scheduler needs at least one worker thread".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("cache-scheduler")
            .enable_time()
            .build()
            .map_err(|e| CacheError::Scheduler(e.to_string()))?;

        let (shutdown_tx, _) = watch::channel(false);

        info!(
            workers = config.worker_threads,
            grace_ms = config.shutdown_grace.as_millis() as u64,
            "Scheduler started"
        );

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            shutdown_tx,
            grace: config.shutdown_grace,
        })
    }

    // == Fixed Rate ==
    /// Runs `job` every `period`, starting after `initial_delay`.
    ///
    /// Ticks are aligned to the schedule; a slow run is followed by
    /// catch-up ticks rather than shifting later runs.
    pub fn schedule_at_fixed_rate(
        &self,
        name: &str,
        initial_delay: Duration,
        period: Duration,
        job: Job,
    ) -> Result<TaskHandle> {
        ensure_positive(name, period)?;
        let start = first_tick(name, initial_delay, period)?;

        let name: Arc<str> = Arc::from(name);
        let task_name = Arc::clone(&name);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = self.spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            debug!(task = %task_name, period_ms = period.as_millis() as u64, "Fixed-rate task started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => run_job(&task_name, || job()),
                }
            }

            debug!(task = %task_name, "Fixed-rate task stopped");
        })?;

        Ok(TaskHandle { name, handle })
    }

    // == Fixed Delay ==
    /// Runs `job` after `initial_delay`, then again `delay` after each run
    /// completes.
    pub fn schedule_with_fixed_delay(
        &self,
        name: &str,
        initial_delay: Duration,
        delay: Duration,
        job: Job,
    ) -> Result<TaskHandle> {
        ensure_positive(name, delay)?;

        let name: Arc<str> = Arc::from(name);
        let task_name = Arc::clone(&name);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = self.spawn(async move {
            debug!(task = %task_name, delay_ms = delay.as_millis() as u64, "Fixed-delay task started");

            tokio::select! {
                _ = shutdown_rx.changed() => return,
                _ = sleep(initial_delay) => {}
            }

            loop {
                run_job(&task_name, || job());

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = sleep(delay) => {}
                }
            }

            debug!(task = %task_name, "Fixed-delay task stopped");
        })?;

        Ok(TaskHandle { name, handle })
    }

    // == Run Async ==
    /// Runs `job` once in the background.
    pub fn run_async<F>(&self, name: &str, job: F) -> Result<TaskHandle>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let task_name = Arc::clone(&name);

        let handle = self.spawn(async move {
            run_job(&task_name, job);
        })?;

        Ok(TaskHandle { name, handle })
    }

    // == Shutdown ==
    /// Stops accepting work, signals every recurring task to stop and waits up
    /// to the grace period for in-flight jobs before dropping the pool.
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            debug!("Scheduler already shut down");
            return;
        };

        info!("Shutting down scheduler");
        let _ = self.shutdown_tx.send(true);

        if Handle::try_current().is_ok() {
            // Blocking on the runtime from inside an async context would panic
            warn!("Scheduler shut down from an async context; in-flight jobs are not awaited");
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(self.grace);
        }

        info!("Scheduler shutdown complete");
    }

    pub fn is_shutdown(&self) -> bool {
        self.runtime.lock().is_none()
    }

    fn spawn<F>(&self, future: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.runtime.lock();
        let runtime = guard.as_ref().ok_or(CacheError::SchedulerShutdown)?;
        Ok(runtime.spawn(future))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("shut_down", &self.is_shutdown())
            .field("grace", &self.grace)
            .finish()
    }
}

fn ensure_positive(name: &str, period: Duration) -> Result<()> {
    if period.is_zero() {
        return Err(CacheError::InvalidConfig(format!(
            "Task '{}' needs a non-zero period",
            name
        )));
    }
    Ok(())
}

/// Start of a fixed-rate schedule. Both the first tick and the one after it
/// must be representable as instants.
fn first_tick(name: &str, initial_delay: Duration, period: Duration) -> Result<Instant> {
    Instant::now()
        .checked_add(initial_delay)
        .filter(|start| start.checked_add(period).is_some())
        .ok_or_else(|| {
            CacheError::InvalidConfig(format!(
                "Task '{}' is scheduled too far in the future",
                name
            ))
        })
}

/// Runs one job on the current worker, containing errors and panics.
fn run_job<F>(name: &str, job: F)
where
    F: FnOnce() -> Result<()>,
{
    // Jobs call into the backing store and may block for a long time
    let outcome = tokio::task::block_in_place(|| panic::catch_unwind(AssertUnwindSafe(job)));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(task = name, error = %err, "Scheduled job failed"),
        Err(_) => error!(task = name, "Scheduled job panicked"),
    }
}
