//! Turns SIGINT/SIGTERM into a [`StopHandle::stop`] call.

use crate::error::Error;
use crate::lifecycle::StopHandle;

use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::{info, warn};

const SIGNAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signal");

/// Background thread listening for termination signals.
///
/// Dropping it (or calling [`close`](Self::close)) unregisters the handlers and
/// joins the thread.
#[derive(Debug)]
pub struct SignalListener {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalListener {
    /// Installs handlers for SIGINT and SIGTERM that stop the server behind `stop`.
    ///
    /// Repeated signals are harmless; only the first one changes state.
    ///
    /// # Errors
    /// Returns [`Error::Signal`] if the handlers cannot be registered or the
    /// listener thread cannot be spawned.
    pub fn install(stop: StopHandle) -> Result<Self, Error> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(Error::Signal)?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("signal-listener".into())
            .spawn(move || {
                for signal in signals.forever() {
                    if stop.stop() {
                        info!(target: SIGNAL_TARGET, signal, "shutdown signal received");
                    } else {
                        warn!(target: SIGNAL_TARGET, signal, "shutdown already in progress");
                    }
                }
            })
            .map_err(Error::Signal)?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Unregisters the handlers and waits for the listener thread to finish.
    pub fn close(mut self) {
        self.shut();
    }

    fn shut(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SIGNAL_TARGET, "signal listener panicked");
        }
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.shut();
    }
}
