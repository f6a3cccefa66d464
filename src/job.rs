use std::any::Any;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::PoolError;

/// Priority tier of a job. Lower tiers are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    High,
    App,
    Task,
    System,
    Low,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::High => write!(f, "high"),
            Level::App => write!(f, "app"),
            Level::Task => write!(f, "task"),
            Level::System => write!(f, "system"),
            Level::Low => write!(f, "low"),
        }
    }
}

/// Value produced by a job, recovered by the submitter via
/// [`Job::wait_result`]. Callers downcast to the concrete type they
/// supplied.
pub type JobOutput = Box<dyn Any + Send>;

/// A unit of work accepted by the [`Dispatcher`](crate::Dispatcher).
///
/// Jobs are submitted as `Arc<dyn Job>`: the caller keeps a clone for
/// result retrieval, the admission queue holds one while the job is
/// pending, and a worker holds one only for the duration of `execute`.
///
/// The dispatcher observes no outcome from `execute`; failure handling is
/// the job's own responsibility.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Caller-assigned identity. Uniqueness is not enforced.
    fn id(&self) -> &str;

    /// Priority tier used by the admission queue.
    fn level(&self) -> Level;

    /// Run the work on an assigned worker.
    async fn execute(&self);

    /// Called exactly once if the job could not acquire a worker before its
    /// admission deadline. `execute` will not be called afterwards.
    fn notify_timeout(&self, cause: PoolError);

    /// Suspend the submitter until the job has a result.
    ///
    /// Jobs without a synchronous result return
    /// [`PoolError::WaitUnsupported`].
    async fn wait_result(&self) -> Result<JobOutput, PoolError> {
        Err(PoolError::WaitUnsupported)
    }
}

impl std::fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id())
            .field("level", &self.level())
            .finish()
    }
}

type SyncWork = Box<dyn FnOnce() -> JobOutput + Send>;
type AsyncWork = Box<dyn FnOnce() + Send>;

/// Blocking job variant: the submitter can wait for the value produced by
/// the work closure.
///
/// The result is handed to the first waiter; later waiters observe
/// [`PoolError::ResultConsumed`]. If admission times out, waiters observe
/// the timeout cause instead of a value.
pub struct SyncJob {
    id: String,
    level: Level,
    work: Mutex<Option<SyncWork>>,
    outcome: Mutex<Option<Result<JobOutput, PoolError>>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl SyncJob {
    pub fn new<T, F>(id: impl Into<String>, level: Level, work: F) -> Self
    where
        T: Any + Send,
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            id: id.into(),
            level,
            work: Mutex::new(Some(Box::new(move || Box::new(work()) as JobOutput))),
            outcome: Mutex::new(None),
            done_tx,
            done_rx,
        }
    }

    fn finish(&self, outcome: Result<JobOutput, PoolError>) {
        *self.outcome.lock().unwrap() = Some(outcome);
        // Never fails: `self` holds a receiver for its whole lifetime.
        let _ = self.done_tx.send(true);
    }
}

#[async_trait]
impl Job for SyncJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn level(&self) -> Level {
        self.level
    }

    async fn execute(&self) {
        let work = self.work.lock().unwrap().take();
        if let Some(work) = work {
            let value = work();
            self.finish(Ok(value));
        }
    }

    fn notify_timeout(&self, cause: PoolError) {
        tracing::warn!(job_id = %self.id, %cause, "sync job missed its admission deadline");
        self.finish(Err(cause));
    }

    async fn wait_result(&self) -> Result<JobOutput, PoolError> {
        let mut done = self.done_rx.clone();
        done.wait_for(|finished| *finished)
            .await
            .map_err(|_| PoolError::ResultConsumed)?;
        self.outcome
            .lock()
            .unwrap()
            .take()
            .ok_or(PoolError::ResultConsumed)?
    }
}

/// Fire-and-forget job variant. `wait_result` is not supported and reports
/// [`PoolError::WaitUnsupported`] instead of aborting the caller.
pub struct AsyncJob {
    id: String,
    level: Level,
    work: Mutex<Option<AsyncWork>>,
}

impl AsyncJob {
    pub fn new<F>(id: impl Into<String>, level: Level, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: id.into(),
            level,
            work: Mutex::new(Some(Box::new(work))),
        }
    }
}

#[async_trait]
impl Job for AsyncJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn level(&self) -> Level {
        self.level
    }

    async fn execute(&self) {
        let work = self.work.lock().unwrap().take();
        if let Some(work) = work {
            work();
        }
    }

    fn notify_timeout(&self, cause: PoolError) {
        tracing::warn!(job_id = %self.id, %cause, "async job missed its admission deadline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_orders_high_before_low() {
        assert!(Level::High < Level::App);
        assert!(Level::App < Level::Task);
        assert!(Level::Task < Level::System);
        assert!(Level::System < Level::Low);
    }

    #[test]
    fn level_display() {
        assert_eq!(Level::High.to_string(), "high");
        assert_eq!(Level::Low.to_string(), "low");
    }

    #[tokio::test]
    async fn sync_job_yields_value_after_execute() {
        let job = SyncJob::new("sum", Level::App, || 2 + 2);
        job.execute().await;
        let out = job.wait_result().await.unwrap();
        assert_eq!(out.downcast_ref::<i32>(), Some(&4));
    }

    #[tokio::test]
    async fn sync_job_result_is_single_take() {
        let job = SyncJob::new("once", Level::App, || ());
        job.execute().await;
        assert!(job.wait_result().await.is_ok());
        assert!(matches!(
            job.wait_result().await,
            Err(PoolError::ResultConsumed)
        ));
    }

    #[tokio::test]
    async fn sync_job_waiter_observes_timeout_cause() {
        let job = SyncJob::new("late", Level::App, || ());
        let window = std::time::Duration::from_millis(5);
        job.notify_timeout(PoolError::AdmissionTimeout(window));
        match job.wait_result().await {
            Err(PoolError::AdmissionTimeout(d)) => assert_eq!(d, window),
            other => panic!("expected timeout cause, got {:?}", other.map(|_| "value")),
        }
    }

    #[test]
    fn job_debug_shows_identity_and_level() {
        let job: std::sync::Arc<dyn Job> =
            std::sync::Arc::new(AsyncJob::new("bg", Level::Low, || ()));
        let rendered = format!("{job:?}");
        assert!(rendered.contains("bg"));
        assert!(rendered.contains("Low"));
    }

    #[tokio::test]
    async fn async_job_wait_is_unsupported() {
        let job = AsyncJob::new("bg", Level::Low, || ());
        assert!(matches!(
            job.wait_result().await,
            Err(PoolError::WaitUnsupported)
        ));
    }
}
