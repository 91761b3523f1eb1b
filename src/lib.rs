//! Readiness-driven TCP server backed by a fixed pool of blocking workers.
//!
//! A single dispatcher thread owns the listening socket and an OS readiness
//! interface (epoll or kqueue). When a connection becomes readable the
//! dispatcher removes it from the interface and hands it, as a [`Task`], to a
//! [`WorkerPool`]. A worker then reads and answers requests until the peer
//! closes, an error occurs, a close is requested, or the socket has nothing
//! more to read; in the last case the connection travels back to the
//! dispatcher to wait for its next request.
//!
//! # Architecture
//!
//! - **Dispatcher**: accepts connections and turns readiness into tasks
//! - **WorkerPool**: fixed threads draining a FIFO [`Task`] queue
//! - **Session**: per-connection read/respond loop on a worker
//! - **Responder**: pluggable request-to-response capability
//! - **StopHandle**: one-shot stop trigger observed between readiness waits
//! - **ServerBuilder**: fluent configuration and binding
//!
//! # Example
//!
//! ```no_run
//! use reactor_server::{ServerBuilder, SignalListener};
//!
//! let server = ServerBuilder::new().port(8080).workers(4).bind()?;
//! let signals = SignalListener::install(server.stop_handle())?;
//! server.run()?;
//! signals.close();
//! # Ok::<(), reactor_server::Error>(())
//! ```

mod builder;
mod error;
mod lifecycle;
mod reactor;
mod response;
mod runtime;
mod server;
mod session;
mod signal;
pub mod telemetry;

pub use builder::{ServerBuilder, ServerConfig};
pub use error::{ConfigError, Error, StartupStage};
pub use lifecycle::{State, StopHandle};
pub use response::{CannedResponse, HELLO_WORLD_RESPONSE, Reply, Responder, wants_close};
pub use runtime::{SubmitError, Task, WorkerPool};
pub use server::Server;
pub use signal::SignalListener;
