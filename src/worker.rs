use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::job::Job;

/// A reusable execution slot. The id only appears in trace output.
pub(crate) struct Worker {
    id: String,
    cancel: CancellationToken,
}

impl Worker {
    fn new(id: String, cancel: CancellationToken) -> Self {
        Self { id, cancel }
    }

    /// Run a job on this worker. Declines if the generation has been
    /// cancelled, in which case the job is dropped without notification.
    async fn run(&self, job: &Arc<dyn Job>) {
        if self.cancel.is_cancelled() {
            tracing::debug!(worker = %self.id, job_id = %job.id(), "declining job, shutting down");
            return;
        }
        tracing::debug!(worker = %self.id, job_id = %job.id(), "executing job");
        job.execute().await;
    }
}

/// Fixed-size pool of worker tokens.
///
/// Capacity admission and token storage are separate: a counting semaphore
/// bounds concurrent holders, a mutex-guarded store holds the idle tokens.
/// While a permit is held the store cannot be empty, because a token is
/// always pushed back before its permit is released.
pub(crate) struct WorkerPool {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Worker>>,
    capacity: usize,
}

impl WorkerPool {
    pub(crate) fn new(capacity: usize, cancel: CancellationToken) -> Arc<Self> {
        let idle = (0..capacity)
            .map(|i| Worker::new(format!("worker-{i}"), cancel.clone()))
            .collect();
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(idle),
            capacity,
        })
    }

    /// Wait for a free worker. The returned lease gives the token back on
    /// drop, on every path.
    pub(crate) async fn acquire(self: Arc<Self>) -> WorkerLease {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        let worker = self
            .idle
            .lock()
            .unwrap()
            .pop()
            .expect("idle store cannot be empty while a permit is held");
        WorkerLease {
            worker: Some(worker),
            pool: self,
            _permit: permit,
        }
    }

    /// Number of currently free workers.
    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Exclusive hold on one worker token.
pub(crate) struct WorkerLease {
    worker: Option<Worker>,
    pool: Arc<WorkerPool>,
    _permit: OwnedSemaphorePermit,
}

impl WorkerLease {
    pub(crate) async fn run(&self, job: &Arc<dyn Job>) {
        if let Some(worker) = &self.worker {
            worker.run(job).await;
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.idle.lock().unwrap().push(worker);
        }
        // The permit is released after this body runs, so the token is
        // visible to the next acquirer.
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::job::{AsyncJob, Level};

    #[tokio::test]
    async fn lease_drop_restores_capacity() {
        let pool = WorkerPool::new(2, CancellationToken::new());
        assert_eq!(pool.available(), 2);

        let a = pool.clone().acquire().await;
        let b = pool.clone().acquire().await;
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), pool.capacity());
    }

    #[tokio::test]
    async fn cancelled_worker_declines_jobs() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new(1, cancel.clone());

        let ran = Arc::new(AtomicUsize::new(0));
        let probe = ran.clone();
        let job: Arc<dyn Job> = Arc::new(AsyncJob::new("declined", Level::App, move || {
            probe.fetch_add(1, Ordering::SeqCst);
        }));

        cancel.cancel();
        let lease = pool.clone().acquire().await;
        lease.run(&job).await;
        drop(lease);

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.available(), 1);
    }
}
