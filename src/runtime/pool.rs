//! Fixed-size pool of worker threads.
//!
//! Each worker runs the same loop: take the next task from the shared
//! [`TaskQueue`], run it to completion, repeat. Blocking work inside a task only
//! ties up its own worker, so at most `size` tasks are ever running at once.

use crate::error::Error;
use crate::runtime::queue::TaskQueue;
use crate::runtime::task::Task;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// Returned by [`WorkerPool::submit`] once the pool has been shut down.
///
/// Carries the rejected task so the caller can release whatever it owns.
#[derive(Debug, thiserror::Error)]
#[error("worker pool is shut down")]
pub struct SubmitError(pub Task);

impl SubmitError {
    /// Gives the rejected task back.
    pub fn into_task(self) -> Task {
        self.0
    }
}

/// A fixed set of persistent threads pulling [`Task`]s from a FIFO queue.
///
/// # Example
/// ```
/// use reactor_server::{Task, WorkerPool};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let mut pool = WorkerPool::new(2, None).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..8 {
///     let counter = counter.clone();
///     pool.submit(Task::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
/// }
/// pool.shutdown();
/// assert_eq!(counter.load(Ordering::SeqCst), 8);
/// ```
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns exactly `size` worker threads named `worker-{id}`.
    ///
    /// # Arguments
    /// * `size` - Number of worker threads
    /// * `capacity` - Queue depth at which [`submit`](Self::submit) starts blocking,
    ///   or `None` for an unbounded queue
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if the OS refuses to create a thread. Workers that
    /// were already started are stopped and joined before returning.
    pub fn new(size: usize, capacity: Option<usize>) -> Result<Self, Error> {
        let queue = Arc::new(TaskQueue::new(capacity));
        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(size),
            size,
        };

        for id in 0..size {
            let queue = pool.queue.clone();
            let worker = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || work(id, &queue))
                .map_err(Error::Spawn)?;
            pool.workers.push(worker);
        }

        debug!(target: POOL_TARGET, workers = size, ?capacity, "worker pool started");
        Ok(pool)
    }

    /// Queues a task and wakes one idle worker.
    ///
    /// Never blocks on an unbounded pool. On a bounded pool the caller sleeps
    /// until the queue drops below its capacity.
    ///
    /// # Errors
    /// Returns the task inside [`SubmitError`] if the pool has been shut down.
    pub fn submit(&self, task: Task) -> Result<(), SubmitError> {
        self.queue.push(task).map_err(SubmitError)
    }

    /// Stops the pool after every queued task has run, then joins all workers.
    ///
    /// Workers only exit once the queue is both closed and empty, so nothing that
    /// was accepted by [`submit`](Self::submit) is dropped. Calling this again is a
    /// no-op.
    pub fn shutdown(&mut self) {
        if self.queue.close() {
            debug!(
                target: POOL_TARGET,
                queued = self.queue.len(),
                "worker pool draining"
            );
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!(target: POOL_TARGET, "worker thread exited by panic");
            }
        }
    }

    /// Number of worker threads the pool was built with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of submitted tasks no worker has picked up yet.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("running", &self.workers.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

fn work(id: usize, queue: &TaskQueue) {
    while let Some(task) = queue.pop() {
        // A panicking task must not take its worker down with it.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            error!(
                target: POOL_TARGET,
                worker = id,
                panic = panic_message(payload.as_ref()),
                "task panicked"
            );
        }
    }

    debug!(target: POOL_TARGET, worker = id, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
