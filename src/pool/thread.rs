use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::FpmError;

/// Queue slots per worker.
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 4;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads pulling jobs from a bounded queue.
///
/// Dropping the pool closes the queue and joins every worker.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    queue_capacity: usize,
    name: String,
}

impl WorkerPool {
    /// `size == 0` uses one worker per CPU.
    pub fn new(size: usize, name: impl Into<String>) -> Result<Self, FpmError> {
        let size = if size == 0 { num_cpus::get() } else { size };
        Self::with_capacity(size, size * DEFAULT_QUEUE_MULTIPLIER, name)
    }

    pub fn with_capacity(
        size: usize,
        queue_capacity: usize,
        name: impl Into<String>,
    ) -> Result<Self, FpmError> {
        let name = name.into();
        if size == 0 {
            return Err(FpmError::config("worker pool needs at least one worker"));
        }

        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let pool = Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Vec::with_capacity(size)),
            worker_count: size,
            queue_capacity,
            name,
        };

        for id in 0..size {
            let rx = Arc::clone(&receiver);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", pool.name, id))
                .spawn(move || worker_loop(id, rx));

            match spawned {
                Ok(handle) => pool
                    .workers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle),
                // Dropping the partially built pool joins what was spawned.
                Err(e) => {
                    return Err(FpmError::config(format!(
                        "failed to spawn worker thread: {}",
                        e
                    )))
                }
            }
        }

        #[cfg(feature = "tracing")]
        info!(
            pool = %pool.name,
            workers = size,
            capacity = queue_capacity,
            "Worker pool started"
        );

        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` on a worker and waits for its result.
    ///
    /// Blocks while the queue is full. Fails with
    /// [`FpmError::PoolShutdown`] after [`shutdown`](Self::shutdown), and
    /// with [`FpmError::WorkerLost`] if the job panics.
    pub fn execute<F, T>(&self, f: F) -> Result<T, FpmError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let _ = reply_tx.send(f());
        });

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(FpmError::PoolShutdown)?;

        sender
            .send(job)
            .map_err(|_| FpmError::PoolShutdown)?;
        drop(sender);

        reply_rx
            .recv()
            .map_err(|_| FpmError::WorkerLost)
    }

    /// Closes the queue and joins every worker. Jobs already queued still
    /// run. Idempotent.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for handle in workers {
            let _ = handle.join();
        }

        #[cfg(feature = "tracing")]
        info!(pool = %self.name, "Worker pool stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

fn worker_loop(_id: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    #[cfg(feature = "tracing")]
    debug!(worker = _id, "Worker started");

    loop {
        let job = {
            let guard = rx
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };

        let Ok(job) = job else {
            break;
        };

        // A panicking job drops its reply sender, which the submitter sees
        // as WorkerLost. The worker itself keeps serving.
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            #[cfg(feature = "tracing")]
            debug!(worker = _id, "Job panicked");
        }
    }

    #[cfg(feature = "tracing")]
    debug!(worker = _id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_execute_returns_value() {
        let pool = WorkerPool::new(2, "test").unwrap();
        assert_eq!(pool.execute(|| 21 * 2).unwrap(), 42);
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.queue_capacity(), 2 * DEFAULT_QUEUE_MULTIPLIER);
    }

    #[test]
    fn test_zero_means_cpu_count() {
        let pool = WorkerPool::new(0, "cpus").unwrap();
        assert_eq!(pool.worker_count(), num_cpus::get());
    }

    #[test]
    fn test_runs_jobs_concurrently() {
        let pool = Arc::new(WorkerPool::new(4, "concurrent").unwrap());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    pool.execute(move || {
                        // Deadlocks unless all four jobs run at once.
                        barrier.wait();
                        i
                    })
                })
            })
            .collect();

        let mut results: Vec<i32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        results.sort();

        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let pool = WorkerPool::new(1, "closing").unwrap();
        pool.shutdown();
        pool.shutdown();

        assert!(pool.is_shutdown());
        assert!(matches!(pool.execute(|| ()), Err(FpmError::PoolShutdown)));
    }

    #[test]
    fn test_panicking_job_is_worker_lost() {
        let pool = WorkerPool::new(1, "panics").unwrap();

        let result = pool.execute(|| -> u8 { panic!("boom") });
        assert!(matches!(result, Err(FpmError::WorkerLost)));

        assert_eq!(pool.execute(|| 7).unwrap(), 7);
    }

    #[test]
    fn test_drop_joins_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2, "drop").unwrap();
            for _ in 0..4 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
