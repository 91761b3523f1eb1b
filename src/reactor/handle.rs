//! Cross-thread handle back into the dispatcher.
//!
//! Workers never touch the readiness interface. When a session runs out of data
//! it hands the connection itself to the dispatcher's inbox and wakes the poller;
//! the dispatcher re-registers it on its next iteration. Moving the stream
//! through the channel means the worker keeps no handle once it returns.

use crate::reactor::poller::Waker;

use std::net::TcpStream;
use std::os::unix::io::AsRawFd;
use std::sync::mpsc::{SendError, Sender};

use tracing::{debug, warn};

const HANDLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reactor");

/// Requests posted to the dispatcher's inbox.
pub(crate) enum Command {
    /// Register this idle connection for read-readiness again.
    Rearm(TcpStream),
}

#[derive(Clone)]
pub(crate) struct ReactorHandle {
    transmitter: Sender<Command>,
    wake: Waker,
}

impl ReactorHandle {
    pub(crate) fn new(transmitter: Sender<Command>, wake: Waker) -> Self {
        Self { transmitter, wake }
    }

    /// Returns an idle connection to the dispatcher.
    ///
    /// If the dispatcher has already gone away the connection is closed here.
    pub(crate) fn rearm(&self, stream: TcpStream) {
        let fd = stream.as_raw_fd();

        match self.transmitter.send(Command::Rearm(stream)) {
            Ok(()) => {
                if let Err(err) = self.wake.wake() {
                    warn!(target: HANDLE_TARGET, fd, error = %err, "failed to wake dispatcher");
                }
            }
            Err(SendError(Command::Rearm(stream))) => {
                debug!(target: HANDLE_TARGET, fd, "dispatcher gone, closing connection");
                drop(stream);
            }
        }
    }
}
