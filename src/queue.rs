use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::job::{Job, Level};

/// Heap entry pairing a job with its priority key.
///
/// `BinaryHeap` is a max-heap, so the ordering is reversed to pop the
/// lowest level first. Entries of equal level compare equal; their relative
/// order is unspecified.
struct QueueItem {
    level: Level,
    job: Arc<dyn Job>,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level.cmp(&other.level).reverse()
    }
}

/// Priority admission queue: a mutex-guarded min-priority heap feeding a
/// bounded dispatch channel, with a bounded ready-signal channel decoupling
/// "enqueued" from "ready to hand to a worker".
///
/// One `JobQueue` lives for exactly one dispatcher generation.
pub(crate) struct JobQueue {
    heap: Mutex<BinaryHeap<QueueItem>>,
    ready_tx: mpsc::Sender<()>,
    jobs_tx: mpsc::Sender<Arc<dyn Job>>,
    cancel: CancellationToken,
}

impl JobQueue {
    /// Build a queue along with the receiving halves of its two channels:
    /// the ready-signal receiver is consumed by [`JobQueue::run`], the
    /// dispatch receiver by the dispatcher's own loop.
    pub(crate) fn new(
        queue_capacity: usize,
        job_capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Receiver<Arc<dyn Job>>) {
        let (ready_tx, ready_rx) = mpsc::channel(job_capacity);
        let (jobs_tx, jobs_rx) = mpsc::channel(job_capacity);
        let queue = Arc::new(Self {
            heap: Mutex::new(BinaryHeap::with_capacity(queue_capacity)),
            ready_tx,
            jobs_tx,
            cancel,
        });
        (queue, ready_rx, jobs_rx)
    }

    /// Enqueue a job keyed by its level and publish one ready signal.
    ///
    /// Suspends when the ready channel is full; this is the system's only
    /// backpressure point. Returns `false` when the generation is shutting
    /// down, in which case the job will never execute.
    pub(crate) async fn insert(&self, job: Arc<dyn Job>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let level = job.level();
        self.heap.lock().unwrap().push(QueueItem { level, job });

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.ready_tx.send(()) => sent.is_ok(),
        }
    }

    /// Long-lived mover: one ready signal moves exactly one minimum-level
    /// item from the heap onto the dispatch channel.
    ///
    /// The ready receiver is handed back on exit so shutdown can drop it
    /// deterministically.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut ready_rx: mpsc::Receiver<()>,
    ) -> mpsc::Receiver<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                signal = ready_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    let item = self.heap.lock().unwrap().pop();
                    let Some(item) = item else { continue };
                    let level = item.level;
                    let retained = item.job.clone();
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            // Undo the pop so clear() still sees the item.
                            self.heap.lock().unwrap().push(QueueItem { level, job: retained });
                            break;
                        }
                        sent = self.jobs_tx.send(item.job) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!("admission queue mover exited");
        ready_rx
    }

    /// Terminal cleanup, called only after both long-lived loops have
    /// exited. Discards everything still in the heap without executing or
    /// notifying, and reports how many jobs that was.
    pub(crate) fn clear(&self) -> usize {
        let mut heap = self.heap.lock().unwrap();
        let discarded = heap.len();
        for item in heap.drain() {
            tracing::debug!(job_id = %item.job.id(), level = %item.level, "discarding pending job");
        }
        discarded
    }
}
