use super::{Readiness, syscall};

use libc::{
    EFD_CLOEXEC, EFD_NONBLOCK, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLIN, epoll_create1,
    epoll_ctl, epoll_event, epoll_wait, eventfd,
};
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::Arc;

const WAKE_TOKEN: u64 = u64::MAX;

pub(crate) struct Poller {
    epoll: OwnedFd,
    wake: Arc<OwnedFd>,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = syscall(unsafe { epoll_create1(EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };

        let wake = syscall(unsafe { eventfd(0, EFD_CLOEXEC | EFD_NONBLOCK) })?;
        let wake = Arc::new(unsafe { OwnedFd::from_raw_fd(wake) });

        let poller = Self { epoll, wake };
        poller.add(poller.wake.as_raw_fd(), WAKE_TOKEN)?;

        Ok(poller)
    }

    fn add(&self, fd: RawFd, token: u64) -> io::Result<()> {
        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: token,
        };

        syscall(unsafe { epoll_ctl(self.epoll.as_raw_fd(), EPOLL_CTL_ADD, fd, &mut event) })?;
        Ok(())
    }

    /// Adds level-triggered read interest for `fd`.
    pub(crate) fn register(&self, fd: RawFd) -> io::Result<()> {
        self.add(fd, fd as u64)
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        syscall(unsafe {
            epoll_ctl(self.epoll.as_raw_fd(), EPOLL_CTL_DEL, fd, ptr::null_mut())
        })?;
        Ok(())
    }

    /// Blocks until at least one event is ready.
    pub(crate) fn wait(&self, events: &mut Events) -> io::Result<()> {
        events.list.clear();
        let n_events = syscall(unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                events.list.as_mut_ptr(),
                events.list.capacity() as i32,
                -1,
            )
        })?;

        // The kernel initialised exactly `n_events` entries.
        unsafe { events.list.set_len(n_events as usize) };
        Ok(())
    }

    pub(crate) fn waker(&self) -> Waker {
        Waker {
            fd: self.wake.clone(),
        }
    }

    /// Consumes pending wakeups so the level-triggered wake source goes quiet.
    pub(crate) fn reset_wake(&self) {
        let mut counter = 0u64;
        unsafe {
            libc::read(
                self.wake.as_raw_fd(),
                &mut counter as *mut u64 as *mut libc::c_void,
                mem::size_of::<u64>(),
            );
        }
    }
}

pub(crate) struct Events {
    list: Vec<epoll_event>,
}

impl Events {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Readiness> + '_ {
        self.list.iter().map(|event| {
            let token = event.u64;
            if token == WAKE_TOKEN {
                Readiness::Wake
            } else {
                Readiness::Readable(token as RawFd)
            }
        })
    }
}

/// Interrupts a blocked [`Poller::wait`] from any thread.
#[derive(Clone)]
pub(crate) struct Waker {
    fd: Arc<OwnedFd>,
}

impl Waker {
    pub(crate) fn wake(&self) -> io::Result<()> {
        let one = 1u64;
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                mem::size_of::<u64>(),
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            // A saturated counter still reads as readable.
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }

        Ok(())
    }
}
