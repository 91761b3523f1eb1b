//! Fluent builder for server configuration.
//!
//! Provides a builder pattern interface for creating [`ServerConfig`] values and
//! binding [`Server`] instances from them.

use crate::error::{ConfigError, Error};
use crate::response::{CannedResponse, Responder};
use crate::server::Server;

use std::net::{Ipv4Addr, SocketAddrV4};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_BACKLOG: i32 = 10;
const DEFAULT_BUFFER_SIZE: usize = 4096;
const DEFAULT_EVENT_CAPACITY: usize = 10;

/// Validated settings for a [`Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to. Port `0` lets the OS pick one.
    pub address: SocketAddrV4,
    /// Number of worker threads.
    pub workers: usize,
    /// `listen(2)` backlog.
    pub backlog: i32,
    /// Largest request a single read can return.
    pub buffer_size: usize,
    /// Maximum number of readiness events handled per wait.
    pub event_capacity: usize,
    /// Queue depth at which the dispatcher waits for a free slot; `None` is unbounded.
    pub queue_capacity: Option<usize>,
    /// Consecutive requests a worker serves on one connection before handing it
    /// back; `None` keeps serving while data keeps arriving.
    pub max_requests_per_turn: Option<usize>,
}

/// Builder for constructing [`ServerConfig`] and [`Server`] values with a fluent API.
///
/// # Example
/// ```
/// use reactor_server::ServerBuilder;
///
/// let config = ServerBuilder::new()
///     .port(8080)
///     .workers(8)
///     .queue_capacity(1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    host: Ipv4Addr,
    port: u16,
    workers: usize,
    backlog: i32,
    buffer_size: usize,
    event_capacity: usize,
    queue_capacity: Option<usize>,
    max_requests_per_turn: Option<usize>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    /// Creates a builder listening on `0.0.0.0:8080` with four workers.
    pub fn new() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            backlog: DEFAULT_BACKLOG,
            buffer_size: DEFAULT_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            queue_capacity: None,
            max_requests_per_turn: None,
        }
    }

    pub fn host(mut self, host: Ipv4Addr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    /// Bounds the task queue; the dispatcher blocks while it is full.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Hands a busy connection back to the dispatcher after `limit` requests.
    pub fn max_requests_per_turn(mut self, limit: usize) -> Self {
        self.max_requests_per_turn = Some(limit);
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the first setting that is zero.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.backlog <= 0 {
            return Err(ConfigError::ZeroBacklog);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_requests_per_turn == Some(0) {
            return Err(ConfigError::ZeroRequestsPerTurn);
        }

        Ok(ServerConfig {
            address: SocketAddrV4::new(self.host, self.port),
            workers: self.workers,
            backlog: self.backlog,
            buffer_size: self.buffer_size,
            event_capacity: self.event_capacity,
            queue_capacity: self.queue_capacity,
            max_requests_per_turn: self.max_requests_per_turn,
        })
    }

    /// Validates the settings and binds a server answering with [`CannedResponse::default`].
    ///
    /// # Errors
    /// See [`Server::bind`].
    pub fn bind(self) -> Result<Server, Error> {
        self.bind_with(CannedResponse::default())
    }

    /// Validates the settings and binds a server using `responder`.
    ///
    /// # Errors
    /// See [`Server::bind`].
    pub fn bind_with<R: Responder>(self, responder: R) -> Result<Server, Error> {
        Server::bind(self.build()?, responder)
    }
}
