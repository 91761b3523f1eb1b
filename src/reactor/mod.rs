//! Readiness dispatcher module.
//!
//! This module owns everything that touches the readiness interface:
//! - [`core`]: the dispatcher loop
//! - [`poller`]: epoll/kqueue backends and the cross-thread waker
//! - [`handle`]: the re-arm inbox workers use to return idle connections
//! - [`socket`]: listening socket setup and accept

pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod poller;
pub(crate) mod socket;
