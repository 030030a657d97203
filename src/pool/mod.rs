//! Bounded worker pool for running sessions off the caller's thread.
//!
//! Submitting blocks while the queue is full, and [`WorkerPool::execute`]
//! blocks until the job has run, so callers keep a synchronous contract.

mod thread;

pub use thread::{WorkerPool, DEFAULT_QUEUE_MULTIPLIER};
