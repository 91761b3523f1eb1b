use super::{Readiness, syscall};

use libc::{
    EV_ADD, EV_CLEAR, EV_DELETE, EV_ENABLE, EVFILT_READ, EVFILT_USER, NOTE_TRIGGER, kevent, kqueue,
};
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::Arc;

const WAKE_IDENT: usize = 1;

pub(crate) struct Poller {
    kqueue: Arc<OwnedFd>,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        let kqueue = syscall(unsafe { kqueue() })?;
        let kqueue = Arc::new(unsafe { OwnedFd::from_raw_fd(kqueue) });

        apply(&kqueue, WAKE_IDENT, EVFILT_USER, EV_ADD | EV_ENABLE | EV_CLEAR, 0)?;

        Ok(Self { kqueue })
    }

    /// Adds level-triggered read interest for `fd`.
    pub(crate) fn register(&self, fd: RawFd) -> io::Result<()> {
        apply(&self.kqueue, fd as usize, EVFILT_READ, EV_ADD | EV_ENABLE, 0)
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        apply(&self.kqueue, fd as usize, EVFILT_READ, EV_DELETE, 0)
    }

    /// Blocks until at least one event is ready.
    pub(crate) fn wait(&self, events: &mut Events) -> io::Result<()> {
        events.list.clear();
        let n_events = syscall(unsafe {
            kevent(
                self.kqueue.as_raw_fd(),
                ptr::null(),
                0,
                events.list.as_mut_ptr(),
                events.list.capacity() as libc::c_int,
                ptr::null(),
            )
        })?;

        // The kernel initialised exactly `n_events` entries.
        unsafe { events.list.set_len(n_events as usize) };
        Ok(())
    }

    pub(crate) fn waker(&self) -> Waker {
        Waker {
            kqueue: self.kqueue.clone(),
        }
    }

    /// `EV_CLEAR` resets the user event as soon as it is delivered.
    pub(crate) fn reset_wake(&self) {}
}

fn apply(kqueue: &OwnedFd, ident: usize, filter: i16, flags: u16, fflags: u32) -> io::Result<()> {
    let mut change: kevent = unsafe { mem::zeroed() };
    change.ident = ident as _;
    change.filter = filter as _;
    change.flags = flags as _;
    change.fflags = fflags as _;

    syscall(unsafe {
        kevent(
            kqueue.as_raw_fd(),
            &change,
            1,
            ptr::null_mut(),
            0,
            ptr::null(),
        )
    })?;
    Ok(())
}

pub(crate) struct Events {
    list: Vec<kevent>,
}

// `kevent::udata` is a raw pointer we never set or read.
unsafe impl Send for Events {}

impl Events {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Readiness> + '_ {
        self.list.iter().map(|event| {
            if event.filter == EVFILT_USER {
                Readiness::Wake
            } else {
                Readiness::Readable(event.ident as RawFd)
            }
        })
    }
}

/// Interrupts a blocked [`Poller::wait`] from any thread.
#[derive(Clone)]
pub(crate) struct Waker {
    kqueue: Arc<OwnedFd>,
}

impl Waker {
    pub(crate) fn wake(&self) -> io::Result<()> {
        apply(&self.kqueue, WAKE_IDENT, EVFILT_USER, 0, NOTE_TRIGGER)
    }
}
