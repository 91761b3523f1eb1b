//! OS readiness backends.
//!
//! Both backends expose the same small surface: level-triggered read interest
//! keyed by descriptor, a blocking wait into an [`Events`] buffer, and a
//! [`Waker`] that any thread can use to interrupt that wait.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
mod kqueue;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use epoll::{Events, Poller, Waker};
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) use kqueue::{Events, Poller, Waker};

use std::io;
use std::os::unix::io::RawFd;

/// One entry of a wait batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The wake source fired.
    Wake,
    /// The descriptor is readable (or hung up, which reads will report).
    Readable(RawFd),
}

fn syscall(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}
