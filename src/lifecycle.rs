//! Server lifecycle: a one-way state machine and the handle that trips it.

use crate::reactor::poller::Waker;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, warn};

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// Where the server is in its life.
///
/// Transitions only move forward: `Running` → `Stopping` → `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Accepting and dispatching connections.
    Running,
    /// Stop requested; the dispatcher is leaving its loop or the pool is draining.
    Stopping,
    /// Every worker has been joined and the listener is closed.
    Stopped,
}

/// Process-wide lifecycle flag shared by the dispatcher and stop handles.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    pub(crate) fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            RUNNING => State::Running,
            STOPPING => State::Stopping,
            _ => State::Stopped,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Moves `Running` → `Stopping`. Only the first caller gets `true`.
    pub(crate) fn begin_stop(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks the shutdown sequence as complete.
    pub(crate) fn finish(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }
}

/// Cloneable trigger that asks a running [`Server`](crate::Server) to stop.
///
/// Safe to call from any thread, including a signal-listening one, and any
/// number of times: only the first call has an effect.
///
/// # Example
/// ```no_run
/// use reactor_server::ServerBuilder;
///
/// let server = ServerBuilder::new().port(8080).workers(4).bind().unwrap();
/// let stop = server.stop_handle();
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(5));
///     stop.stop();
/// });
/// server.run().unwrap();
/// ```
#[derive(Clone)]
pub struct StopHandle {
    lifecycle: Arc<Lifecycle>,
    waker: Waker,
}

impl StopHandle {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>, waker: Waker) -> Self {
        Self { lifecycle, waker }
    }

    /// Requests shutdown and wakes the dispatcher.
    ///
    /// Returns `true` if this call performed the transition, `false` if a stop
    /// had already been requested.
    pub fn stop(&self) -> bool {
        if !self.lifecycle.begin_stop() {
            debug!("stop already requested");
            return false;
        }

        if let Err(err) = self.waker.wake() {
            warn!(error = %err, "failed to wake dispatcher for shutdown");
        }
        true
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.lifecycle.state()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("state", &self.state())
            .finish()
    }
}
