//! Error types shared by the server components.
//!
//! Only startup and readiness-wait failures ever leave the crate; failures on a
//! single connection are logged where they happen and end that connection only.

use std::fmt;
use std::io;

use thiserror::Error;

/// Configuration rejected by [`ServerBuilder::build`](crate::ServerBuilder::build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker count must be greater than zero")]
    ZeroWorkers,
    #[error("listen backlog must be greater than zero")]
    ZeroBacklog,
    #[error("read buffer size must be greater than zero")]
    ZeroBufferSize,
    #[error("event batch capacity must be greater than zero")]
    ZeroEventCapacity,
    #[error("queue capacity, when set, must be greater than zero")]
    ZeroQueueCapacity,
    #[error("requests per turn, when set, must be greater than zero")]
    ZeroRequestsPerTurn,
}

/// Step of listening socket setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    Create,
    Configure,
    Bind,
    Listen,
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Create => "create",
            Self::Configure => "configure",
            Self::Bind => "bind",
            Self::Listen => "listen on",
        };
        f.write_str(stage)
    }
}

/// Errors surfaced by [`Server`](crate::Server) and the binary bootstrap.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration did not validate.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The listening socket could not be set up.
    #[error("failed to {stage} listening socket: {source}")]
    Startup {
        stage: StartupStage,
        #[source]
        source: io::Error,
    },
    /// The readiness interface could not be created.
    #[error("failed to create readiness poller: {0}")]
    Poller(#[source] io::Error),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
    /// Waiting on the readiness interface failed for a reason other than an interrupt.
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),
    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

impl Error {
    pub(crate) fn startup(stage: StartupStage) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Startup { stage, source }
    }
}
