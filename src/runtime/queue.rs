//! Thread-safe task queue shared by the dispatcher and the workers.
//!
//! Provides a FIFO queue guarded by a single mutex. Workers sleep on a condition
//! variable until a task arrives or the queue is closed; when a capacity is set,
//! producers sleep on a second condition variable until a slot frees up.

use crate::runtime::task::Task;

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// A FIFO queue of [`Task`]s with blocking pop and optional bounded push.
///
/// Every read or write of the queue happens under its lock, and every wait
/// re-checks its condition after waking so spurious wakeups are harmless.
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    space: Condvar,
    capacity: Option<usize>,
}

impl TaskQueue {
    /// Creates an empty queue.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of queued tasks, or `None` for unbounded
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            space: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task and wakes one waiting worker.
    ///
    /// Blocks while the queue is at capacity. Returns the task back if the
    /// queue has been closed, including when it closes while we wait for space.
    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.lock();

        if let Some(capacity) = self.capacity {
            while !state.closed && state.tasks.len() >= capacity {
                state = self
                    .space
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        if state.closed {
            return Err(task);
        }

        state.tasks.push_back(task);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Removes the next task, sleeping until one is available.
    ///
    /// Returns `None` only once the queue is closed *and* empty, so tasks queued
    /// before [`close`](Self::close) are still handed out.
    pub(crate) fn pop(&self) -> Option<Task> {
        let mut state = self.lock();

        loop {
            if let Some(task) = state.tasks.pop_front() {
                drop(state);
                self.space.notify_one();
                return Some(task);
            }

            if state.closed {
                return None;
            }

            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stops accepting new tasks and wakes every sleeper.
    ///
    /// Returns `false` if the queue was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);

        self.available.notify_all();
        self.space.notify_all();
        true
    }

    /// Number of tasks waiting to be picked up.
    pub(crate) fn len(&self) -> usize {
        self.lock().tasks.len()
    }
}
