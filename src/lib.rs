//! Bounded-concurrency job dispatcher with a priority admission queue.
//!
//! Callers submit [`Job`]s tagged with a priority [`Level`]; a fixed-size
//! pool of workers executes them, pulling higher-priority work first,
//! subject to a per-job admission timeout.
//!
//! # Flow
//!
//! 1. [`Dispatcher::join`] pushes the job into a priority heap and signals
//!    readiness, suspending the submitter when the signal channel is full;
//!    this is the only backpressure point.
//! 2. A background mover copies the minimum-level job onto the bounded
//!    dispatch channel.
//! 3. The dispatch loop races each received job against its admission
//!    deadline: a worker frees up in time and runs it, or the job is told
//!    it timed out and no worker is consumed.
//!
//! # Guarantees and non-guarantees
//!
//! - A job either executes exactly once, times out exactly once, or is
//!   discarded during shutdown; never more than one of these.
//! - Worker tokens never leak: free + in-use always equals the configured
//!   worker capacity.
//! - Jobs resident together in the heap leave it in level order, but
//!   equal-level jobs have no FIFO guarantee, and decoupled dispatch means
//!   global execution order is not a strict priority order.
//! - Nothing is retried, and delivery is not guaranteed: see
//!   [`Dispatcher::join`] and [`Dispatcher::stop`] for the observable drop
//!   paths.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;

mod queue;
mod worker;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{PoolError, Result};
pub use job::{AsyncJob, Job, JobOutput, Level, SyncJob};
