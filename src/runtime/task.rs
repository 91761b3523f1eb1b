//! Units of work executed by the worker pool.

use std::fmt;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A zero-argument unit of work, consumed exactly once by exactly one worker.
///
/// The dispatcher builds one task per readable connection; the task owns the
/// connection until it runs.
///
/// # Example
/// ```
/// use reactor_server::Task;
///
/// let task = Task::new(|| println!("handled"));
/// task.run();
/// ```
pub struct Task {
    job: Job,
}

impl Task {
    /// Wraps a closure as a task.
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Box::new(job) }
    }

    /// Runs the task on the current thread, consuming it.
    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
