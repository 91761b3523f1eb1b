use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::reactor::handle::{Command, ReactorHandle};
use crate::reactor::poller::{Events, Poller, Readiness, Waker};
use crate::reactor::socket::accept_client;
use crate::runtime::{Task, WorkerPool};
use crate::session::SessionHandler;

use std::collections::HashMap;
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use tracing::{debug, error, info, trace, warn};

const REACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reactor");

/// Single-threaded readiness loop.
///
/// Owns the listening socket, the poller, and every connection that is idle
/// and waiting for data. A connection is in exactly one place at a time: the
/// `idle` map, a queued or running [`Task`], or the re-arm inbox.
pub(crate) struct Dispatcher {
    poller: Poller,
    events: Events,
    ready: Vec<Readiness>,
    listener: Option<TcpListener>,
    listener_fd: RawFd,
    accepting: bool,
    idle: HashMap<RawFd, TcpStream>,
    inbox: Receiver<Command>,
    handle: ReactorHandle,
    lifecycle: Arc<Lifecycle>,
}

impl Dispatcher {
    /// Takes ownership of a bound listener and registers it for readiness.
    ///
    /// # Errors
    /// Returns [`Error::Poller`] if the readiness interface cannot be created or
    /// the listener cannot be registered with it.
    pub(crate) fn new(
        listener: TcpListener,
        event_capacity: usize,
        lifecycle: Arc<Lifecycle>,
    ) -> Result<Self, Error> {
        let poller = Poller::new().map_err(Error::Poller)?;
        let listener_fd = listener.as_raw_fd();
        poller.register(listener_fd).map_err(Error::Poller)?;

        let (transmitter, inbox) = mpsc::channel();
        let handle = ReactorHandle::new(transmitter, poller.waker());

        Ok(Self {
            poller,
            events: Events::with_capacity(event_capacity),
            ready: Vec::with_capacity(event_capacity),
            listener: Some(listener),
            listener_fd,
            accepting: true,
            idle: HashMap::new(),
            inbox,
            handle,
            lifecycle,
        })
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        match &self.listener {
            Some(listener) => listener.local_addr(),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "listener already closed",
            )),
        }
    }

    pub(crate) fn waker(&self) -> Waker {
        self.poller.waker()
    }

    /// Runs until the lifecycle leaves `Running` or the wait call fails.
    ///
    /// Readable connections are deregistered and handed to `pool` wrapped in a
    /// task that runs `session`. In-flight tasks are left alone on exit.
    ///
    /// # Errors
    /// Returns [`Error::Wait`] if waiting fails for any reason other than an
    /// interrupt.
    pub(crate) fn run(
        &mut self,
        pool: &WorkerPool,
        session: &Arc<SessionHandler>,
    ) -> Result<(), Error> {
        info!(target: REACTOR_TARGET, "event loop started");

        while self.lifecycle.is_running() {
            self.drain_inbox();

            if let Err(err) = self.poller.wait(&mut self.events) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(target: REACTOR_TARGET, error = %err, "readiness wait failed");
                return Err(Error::Wait(err));
            }

            let mut ready = mem::take(&mut self.ready);
            ready.extend(self.events.iter());
            for readiness in ready.drain(..) {
                match readiness {
                    Readiness::Wake => self.poller.reset_wake(),
                    Readiness::Readable(fd) if fd == self.listener_fd => self.accept_pending(),
                    Readiness::Readable(fd) => self.hand_off(fd, pool, session),
                }
            }
            self.ready = ready;
        }

        info!(target: REACTOR_TARGET, "event loop stopped");
        Ok(())
    }

    /// Re-registers every connection workers have handed back.
    fn drain_inbox(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(Command::Rearm(stream)) => self.park(stream),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn accept_pending(&mut self) {
        while self.accepting && self.lifecycle.is_running() {
            let Some(listener) = &self.listener else {
                return;
            };

            match accept_client(listener) {
                Ok(Some((stream, peer))) => {
                    debug!(target: REACTOR_TARGET, fd = stream.as_raw_fd(), %peer, "accepted connection");
                    self.park(stream);
                }
                Ok(None) => break,
                Err(err) => {
                    // The listener stays readable, so errors such as EMFILE
                    // repeat on every iteration until descriptors free up.
                    warn!(target: REACTOR_TARGET, error = %err, "accept failed");
                    break;
                }
            }
        }
    }

    /// Registers `stream` for read-readiness and keeps it in the idle map.
    fn park(&mut self, stream: TcpStream) {
        let fd = stream.as_raw_fd();

        if let Err(err) = self.poller.register(fd) {
            warn!(target: REACTOR_TARGET, fd, error = %err, "failed to register connection");
            return;
        }

        trace!(target: REACTOR_TARGET, fd, "connection idle");
        self.idle.insert(fd, stream);
    }

    fn hand_off(&mut self, fd: RawFd, pool: &WorkerPool, session: &Arc<SessionHandler>) {
        let Some(stream) = self.idle.remove(&fd) else {
            trace!(target: REACTOR_TARGET, fd, "event for unknown descriptor");
            return;
        };

        if let Err(err) = self.poller.deregister(fd) {
            debug!(target: REACTOR_TARGET, fd, error = %err, "deregister failed");
        }

        let session = session.clone();
        let reactor = self.handle.clone();
        let task = Task::new(move || {
            session.handle(stream, &reactor);
        });

        debug!(target: REACTOR_TARGET, fd, "dispatching connection");
        if let Err(rejected) = pool.submit(task) {
            warn!(target: REACTOR_TARGET, fd, "worker pool rejected connection, closing");
            drop(rejected.into_task());
        }
    }

    /// Removes the listener from the readiness interface so nothing new is accepted.
    pub(crate) fn stop_accepting(&mut self) {
        if !self.accepting {
            return;
        }
        self.accepting = false;

        if self.listener.is_some()
            && let Err(err) = self.poller.deregister(self.listener_fd)
        {
            debug!(target: REACTOR_TARGET, error = %err, "failed to deregister listener");
        }
    }

    /// Closes the listener, idle connections, and anything re-armed after the
    /// loop stopped. Safe to call more than once.
    pub(crate) fn close(&mut self) {
        self.stop_accepting();

        if self.listener.take().is_some() {
            info!(target: REACTOR_TARGET, "listener closed");
        }

        while let Ok(Command::Rearm(stream)) = self.inbox.try_recv() {
            drop(stream);
        }

        let idle = self.idle.len();
        self.idle.clear();
        if idle > 0 {
            debug!(target: REACTOR_TARGET, connections = idle, "closed idle connections");
        }
    }
}
