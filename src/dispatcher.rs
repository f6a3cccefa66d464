//! The orchestrating state machine: owns one generation of admission queue
//! plus worker pool and performs timed job-to-worker assignment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::PoolError;
use crate::job::Job;
use crate::queue::JobQueue;
use crate::worker::WorkerPool;

/// Everything owned by one start/stop cycle. Dropped wholesale on `stop`,
/// so nothing leaks into the next generation.
struct Generation {
    queue: Arc<JobQueue>,
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    mover: JoinHandle<mpsc::Receiver<()>>,
    runner: JoinHandle<mpsc::Receiver<Arc<dyn Job>>>,
}

/// Bounded-concurrency job dispatcher.
///
/// Two states: *stopped* (`None` generation) and *started*. The generation
/// slot's mutex is the single transition lock; `start`, `join` and `stop`
/// never interleave with each other.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use jobpool::{Config, Dispatcher, Job, Level, SyncJob};
/// # async fn demo() {
/// let dispatcher = Dispatcher::new(Config::default());
/// dispatcher.start().await;
///
/// let job = Arc::new(SyncJob::new("sum", Level::App, || 2 + 2));
/// dispatcher.join(job.clone()).await.unwrap();
/// let out = job.wait_result().await.unwrap();
/// assert_eq!(out.downcast_ref::<i32>(), Some(&4));
///
/// dispatcher.stop().await;
/// # }
/// ```
pub struct Dispatcher {
    config: Config,
    timeout: Duration,
    generation: Mutex<Option<Generation>>,
}

impl Dispatcher {
    /// Build a stopped dispatcher. The config is clamped here, so
    /// out-of-range values are corrected before anything is sized by them.
    pub fn new(mut config: Config) -> Self {
        config.clamp();
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            config,
            timeout,
            generation: Mutex::new(None),
        }
    }

    /// The clamped configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transition `stopped → started`. Returns whether the transition
    /// occurred; a dispatcher that is already started is left untouched.
    pub async fn start(&self) -> bool {
        let mut slot = self.generation.lock().await;
        if slot.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let (queue, ready_rx, jobs_rx) = JobQueue::new(
            self.config.queue_capacity,
            self.config.job_capacity,
            cancel.clone(),
        );
        let pool = WorkerPool::new(self.config.worker_capacity, cancel.clone());

        let mover = tokio::spawn(queue.clone().run(ready_rx));
        let runner = tokio::spawn(run(cancel.clone(), jobs_rx, pool.clone(), self.timeout));

        tracing::info!(
            workers = self.config.worker_capacity,
            timeout_ms = self.config.timeout_ms,
            "dispatcher started"
        );
        *slot = Some(Generation {
            queue,
            pool,
            cancel,
            mover,
            runner,
        });
        true
    }

    /// Submit a job for execution.
    ///
    /// Suspends when the admission queue is exerting backpressure. Returns
    /// [`PoolError::Rejected`] when the dispatcher is stopped or stopping;
    /// a rejected job is never executed and never notified.
    pub async fn join(&self, job: Arc<dyn Job>) -> Result<(), PoolError> {
        let slot = self.generation.lock().await;
        match slot.as_ref() {
            Some(generation) if !generation.cancel.is_cancelled() => {
                tracing::debug!(job_id = %job.id(), level = %job.level(), "job submitted");
                if generation.queue.insert(job).await {
                    Ok(())
                } else {
                    Err(PoolError::Rejected)
                }
            }
            _ => {
                tracing::debug!(job_id = %job.id(), "rejecting job, dispatcher stopped");
                Err(PoolError::Rejected)
            }
        }
    }

    /// Transition `started → stopped`: cancel the generation token once,
    /// wait for both long-lived loops to exit, then discard whatever never
    /// reached a worker.
    ///
    /// Returns the number of discarded jobs, or `None` when the dispatcher
    /// was already stopped (repeated calls are no-ops).
    pub async fn stop(&self) -> Option<usize> {
        let mut slot = self.generation.lock().await;
        let generation = slot.take()?;

        generation.cancel.cancel();
        let _ready_rx = generation.mover.await.expect("queue mover task panicked");
        let mut jobs_rx = generation.runner.await.expect("dispatcher loop panicked");

        let mut discarded = generation.queue.clear();
        while let Ok(job) = jobs_rx.try_recv() {
            tracing::debug!(job = ?job, "discarding undispatched job");
            discarded += 1;
        }

        tracing::info!(discarded, "dispatcher stopped");
        Some(discarded)
    }

    pub async fn is_started(&self) -> bool {
        self.generation.lock().await.is_some()
    }

    /// Number of currently free worker tokens; 0 while stopped.
    pub async fn available_workers(&self) -> usize {
        self.generation
            .lock()
            .await
            .as_ref()
            .map(|generation| generation.pool.available())
            .unwrap_or(0)
    }
}

/// Long-lived dispatch loop: pulls ready jobs off the dispatch channel and
/// spawns one transient assignment task per job. Hands the receiver back on
/// exit so `stop` can drain and count the residue.
async fn run(
    cancel: CancellationToken,
    mut jobs_rx: mpsc::Receiver<Arc<dyn Job>>,
    pool: Arc<WorkerPool>,
    timeout: Duration,
) -> mpsc::Receiver<Arc<dyn Job>> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = jobs_rx.recv() => {
                let Some(job) = received else { break };
                tokio::spawn(assign(job, pool.clone(), cancel.clone(), timeout));
            }
        }
    }
    tracing::debug!("dispatcher loop exited");
    jobs_rx
}

/// Race one job's admission deadline against worker acquisition.
///
/// The deadline starts when the job came off the dispatch channel, not at
/// submission. On timeout no worker token is consumed. A job whose
/// acquisition wins after the generation was cancelled is dropped without
/// notification.
async fn assign(
    job: Arc<dyn Job>,
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    tokio::select! {
        _ = time::sleep_until(deadline) => {
            tracing::debug!(job_id = %job.id(), ?timeout, "admission timeout");
            job.notify_timeout(PoolError::AdmissionTimeout(timeout));
        }
        lease = pool.acquire() => {
            if cancel.is_cancelled() {
                tracing::debug!(job_id = %job.id(), "dropping job, dispatcher stopped");
                return;
            }
            if Instant::now() >= deadline {
                // The token arrived after the deadline had already passed;
                // the lease goes straight back without running the job.
                job.notify_timeout(PoolError::AdmissionTimeout(timeout));
                return;
            }
            lease.run(&job).await;
        }
    }
}
