use serde::{Deserialize, Serialize};

const QUEUE_CAPACITY_DEFAULT: usize = 200;
const QUEUE_CAPACITY_MIN: usize = 100;
const QUEUE_CAPACITY_MAX: usize = 500;

const JOB_CAPACITY_DEFAULT: usize = 50;
const JOB_CAPACITY_MIN: usize = 20;
const JOB_CAPACITY_MAX: usize = 100;

const WORKER_CAPACITY_DEFAULT: usize = 20;
const WORKER_CAPACITY_MIN: usize = 10;
const WORKER_CAPACITY_MAX: usize = 100;

const TIMEOUT_DEFAULT_MS: u64 = 3000;
const TIMEOUT_MIN_MS: u64 = 1;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// The three capacity fields are clamped into fixed ranges; the admission
/// timeout has a floor of 1 ms and no upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of the priority admission heap.
    pub queue_capacity: usize,

    /// Capacity of the ready-signal and dispatch channels.
    pub job_capacity: usize,

    /// Number of reusable worker tokens in the pool.
    pub worker_capacity: usize,

    /// How long a dequeued job may wait for a free worker, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: QUEUE_CAPACITY_DEFAULT,
            job_capacity: JOB_CAPACITY_DEFAULT,
            worker_capacity: WORKER_CAPACITY_DEFAULT,
            timeout_ms: TIMEOUT_DEFAULT_MS,
        }
    }
}

impl Config {
    /// Clamp every field into its supported range.
    ///
    /// Called by `Dispatcher::new`, so out-of-range values never reach the
    /// queue or pool constructors.
    pub fn clamp(&mut self) {
        self.queue_capacity = self
            .queue_capacity
            .clamp(QUEUE_CAPACITY_MIN, QUEUE_CAPACITY_MAX);
        self.job_capacity = self.job_capacity.clamp(JOB_CAPACITY_MIN, JOB_CAPACITY_MAX);
        self.worker_capacity = self
            .worker_capacity
            .clamp(WORKER_CAPACITY_MIN, WORKER_CAPACITY_MAX);
        self.timeout_ms = self.timeout_ms.max(TIMEOUT_MIN_MS);
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Config:\n\tQueueCapacity: {}\n\tJobCapacity: {}\n\tWorkerCapacity: {}\n\tTimeoutMs: {}",
            self.queue_capacity, self.job_capacity, self.worker_capacity, self.timeout_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let cfg = Config::default();
        assert_eq!(cfg.queue_capacity, 200);
        assert_eq!(cfg.job_capacity, 50);
        assert_eq!(cfg.worker_capacity, 20);
        assert_eq!(cfg.timeout_ms, 3000);
    }

    #[test]
    fn config_clamp_raises_low_values() {
        let mut cfg = Config {
            queue_capacity: 1,
            job_capacity: 1,
            worker_capacity: 1,
            timeout_ms: 0,
        };
        cfg.clamp();
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.job_capacity, 20);
        assert_eq!(cfg.worker_capacity, 10);
        assert_eq!(cfg.timeout_ms, 1);
    }

    #[test]
    fn config_clamp_lowers_high_values() {
        let mut cfg = Config {
            queue_capacity: 10_000,
            job_capacity: 10_000,
            worker_capacity: 10_000,
            timeout_ms: u64::MAX,
        };
        cfg.clamp();
        assert_eq!(cfg.queue_capacity, 500);
        assert_eq!(cfg.job_capacity, 100);
        assert_eq!(cfg.worker_capacity, 100);
        // The timeout has no upper bound.
        assert_eq!(cfg.timeout_ms, u64::MAX);
    }

    #[test]
    fn config_clamp_keeps_in_range_values() {
        let mut cfg = Config {
            queue_capacity: 300,
            job_capacity: 60,
            worker_capacity: 40,
            timeout_ms: 500,
        };
        let before = cfg.clone();
        cfg.clamp();
        assert_eq!(cfg, before);
    }

    #[test]
    fn config_display_lists_all_fields() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("QueueCapacity: 200"));
        assert!(rendered.contains("JobCapacity: 50"));
        assert!(rendered.contains("WorkerCapacity: 20"));
        assert!(rendered.contains("TimeoutMs: 3000"));
    }
}
