//! Per-connection request/response loop, run on a worker thread.
//!
//! A session keeps reading while the peer keeps sending, so a busy connection
//! does not bounce through the dispatcher between requests. As soon as a read
//! would block, the connection goes back to the dispatcher and the worker is
//! free again. Each successful read is treated as one whole request.

use crate::reactor::handle::ReactorHandle;
use crate::response::Responder;

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};

use tracing::{debug, trace, warn};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// How a single [`SessionHandler::handle`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Peer closed its side.
    PeerClosed,
    /// Request asked for the connection to be closed.
    CloseRequested,
    /// Reading failed.
    ReadFailed,
    /// Writing the reply failed.
    WriteFailed,
    /// No data right now; connection handed back to the dispatcher.
    Rearmed,
    /// Served the per-turn request limit; connection handed back to the dispatcher.
    Yielded,
}

/// Drives one connection's exchanges until it ends or has nothing to read.
pub(crate) struct SessionHandler {
    responder: Box<dyn Responder>,
    buffer_size: usize,
    max_requests_per_turn: Option<usize>,
}

impl SessionHandler {
    pub(crate) fn new(
        responder: Box<dyn Responder>,
        buffer_size: usize,
        max_requests_per_turn: Option<usize>,
    ) -> Self {
        Self {
            responder,
            buffer_size,
            max_requests_per_turn,
        }
    }

    /// Serves `stream` until a terminal condition or a would-block.
    ///
    /// On every terminal outcome the stream is dropped here, which closes it.
    /// On [`Outcome::Rearmed`] and [`Outcome::Yielded`] ownership moves to the
    /// dispatcher through `reactor`.
    pub(crate) fn handle(&self, mut stream: TcpStream, reactor: &ReactorHandle) -> Outcome {
        let fd = stream.as_raw_fd();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut served = 0usize;

        let outcome = loop {
            let n_read = match stream.read(&mut buffer) {
                Ok(0) => break Outcome::PeerClosed,
                Ok(n_read) => n_read,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    reactor.rearm(stream);
                    break Outcome::Rearmed;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(target: SESSION_TARGET, fd, error = %err, "read failed");
                    break Outcome::ReadFailed;
                }
            };

            let request = &buffer[..n_read];
            trace!(target: SESSION_TARGET, fd, bytes = n_read, "request received");

            let reply = self.responder.respond(request);
            if let Err(err) = write_all(&mut stream, reply.bytes()) {
                warn!(target: SESSION_TARGET, fd, error = %err, "write failed");
                break Outcome::WriteFailed;
            }

            if reply.close() {
                break Outcome::CloseRequested;
            }

            served += 1;
            if self
                .max_requests_per_turn
                .is_some_and(|limit| served >= limit)
            {
                reactor.rearm(stream);
                break Outcome::Yielded;
            }
        };

        debug!(target: SESSION_TARGET, fd, served, ?outcome, "session turn ended");
        outcome
    }
}

/// Writes the whole buffer to a non-blocking stream, parking the calling
/// worker on write-readiness whenever the socket buffer is full.
fn write_all(stream: &mut TcpStream, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n_written) => bytes = &bytes[n_written..],
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                wait_writable(stream.as_raw_fd())?
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

fn wait_writable(fd: RawFd) -> io::Result<()> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };

    loop {
        let ret = unsafe { libc::poll(&mut pollfd, 1, -1) };
        if ret >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
