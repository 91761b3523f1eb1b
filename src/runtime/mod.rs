//! Worker pool subsystem: tasks, the shared queue, and the threads that drain it.

pub(crate) mod pool;
pub(crate) mod queue;
pub(crate) mod task;

pub use pool::{SubmitError, WorkerPool};
pub use task::Task;
