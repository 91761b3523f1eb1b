//! The server: a dispatcher thread feeding a fixed worker pool.
//!
//! [`Server::run`] blocks the calling thread in the dispatcher loop until a
//! [`StopHandle`] fires, then shuts down in a fixed order:
//!
//! 1. stop accepting (listener leaves the readiness interface)
//! 2. drain the task queue and join every worker
//! 3. close the listener and any connection still idle
//! 4. mark the lifecycle `Stopped`
//!
//! Connections that are mid-session when the stop arrives are never cut off;
//! they run until they end or would block, and are closed at that point.

use crate::builder::ServerConfig;
use crate::error::Error;
use crate::lifecycle::{Lifecycle, State, StopHandle};
use crate::reactor::core::Dispatcher;
use crate::reactor::socket::bind_listener;
use crate::response::Responder;
use crate::runtime::WorkerPool;
use crate::session::SessionHandler;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// A bound, ready-to-run server.
///
/// # Example
/// ```no_run
/// use reactor_server::ServerBuilder;
///
/// let server = ServerBuilder::new().port(8080).workers(4).bind()?;
/// println!("listening on {}", server.local_addr()?);
/// server.run()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Server {
    dispatcher: Dispatcher,
    pool: WorkerPool,
    session: Arc<SessionHandler>,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Binds the listening socket, creates the readiness interface, and spawns
    /// the worker pool.
    ///
    /// # Errors
    /// Any failure here is fatal: [`Error::Startup`] for the listening socket,
    /// [`Error::Poller`] for the readiness interface, [`Error::Spawn`] for the
    /// workers.
    pub fn bind<R: Responder>(config: ServerConfig, responder: R) -> Result<Self, Error> {
        let listener = bind_listener(config.address, config.backlog)?;
        let lifecycle = Arc::new(Lifecycle::new());
        let dispatcher = Dispatcher::new(listener, config.event_capacity, lifecycle.clone())?;
        let pool = WorkerPool::new(config.workers, config.queue_capacity)?;
        let session = Arc::new(SessionHandler::new(
            Box::new(responder),
            config.buffer_size,
            config.max_requests_per_turn,
        ));

        info!(
            target: SERVER_TARGET,
            address = %config.address,
            workers = config.workers,
            backlog = config.backlog,
            "server bound"
        );

        Ok(Self {
            dispatcher,
            pool,
            session,
            lifecycle,
        })
    }

    /// Address the listener is bound to, including an OS-assigned port.
    ///
    /// # Errors
    /// Fails if the OS cannot report the socket name.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.dispatcher.local_addr()
    }

    /// A handle that stops this server from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.lifecycle.clone(), self.dispatcher.waker())
    }

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    /// Runs the dispatcher loop on the current thread until stopped, then
    /// performs the shutdown sequence.
    ///
    /// # Errors
    /// Returns [`Error::Wait`] if the readiness wait failed fatally. The shutdown
    /// sequence has still completed by the time the error is returned.
    pub fn run(mut self) -> Result<(), Error> {
        let outcome = self.dispatcher.run(&self.pool, &self.session);

        // A fatal wait error leaves the lifecycle `Running`.
        self.lifecycle.begin_stop();
        self.shutdown();

        outcome
    }

    fn shutdown(&mut self) {
        info!(target: SERVER_TARGET, "shutting down: no longer accepting");
        self.dispatcher.stop_accepting();

        info!(target: SERVER_TARGET, queued = self.pool.queued(), "shutting down: draining workers");
        self.pool.shutdown();

        self.dispatcher.close();
        self.lifecycle.finish();
        info!(target: SERVER_TARGET, "server stopped");
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr().ok())
            .field("state", &self.state())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
