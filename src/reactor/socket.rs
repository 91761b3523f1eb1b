//! Listening socket setup and connection acceptance.

use crate::error::{Error, StartupStage};

use libc::{
    AF_INET, F_GETFL, F_SETFD, F_SETFL, FD_CLOEXEC, O_NONBLOCK, SO_REUSEADDR, SOCK_STREAM,
    SOL_SOCKET, bind, fcntl, listen, setsockopt, sockaddr, sockaddr_in, socket, socklen_t,
};
use std::io;
use std::mem;
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Creates a non-blocking IPv4 listening socket bound to `address`.
///
/// This method performs the following:
/// 1. Creates a new socket
/// 2. Enables `SO_REUSEADDR`, close-on-exec, and non-blocking mode
/// 3. Binds to the specified address
/// 4. Starts listening with the given backlog
///
/// # Errors
/// Returns [`Error::Startup`] tagged with the step that failed. The socket is
/// closed on every error path.
pub(crate) fn bind_listener(address: SocketAddrV4, backlog: i32) -> Result<TcpListener, Error> {
    let file_descriptor = unsafe { socket(AF_INET, SOCK_STREAM, 0) };
    if file_descriptor < 0 {
        return Err(Error::startup(StartupStage::Create)(io::Error::last_os_error()));
    }
    let socket_fd = unsafe { OwnedFd::from_raw_fd(file_descriptor) };

    configure(socket_fd.as_raw_fd()).map_err(Error::startup(StartupStage::Configure))?;

    let addr = to_sockaddr(address);
    let ret = unsafe {
        bind(
            socket_fd.as_raw_fd(),
            &addr as *const sockaddr_in as *const sockaddr,
            mem::size_of::<sockaddr_in>() as socklen_t,
        )
    };
    if ret < 0 {
        return Err(Error::startup(StartupStage::Bind)(io::Error::last_os_error()));
    }

    let ret = unsafe { listen(socket_fd.as_raw_fd(), backlog) };
    if ret < 0 {
        return Err(Error::startup(StartupStage::Listen)(io::Error::last_os_error()));
    }

    Ok(TcpListener::from(socket_fd))
}

fn configure(file_descriptor: RawFd) -> io::Result<()> {
    let enable: libc::c_int = 1;
    let ret = unsafe {
        setsockopt(
            file_descriptor,
            SOL_SOCKET,
            SO_REUSEADDR,
            &enable as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { fcntl(file_descriptor, F_SETFD, FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }

    set_nonblocking(file_descriptor)
}

fn set_nonblocking(file_descriptor: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { fcntl(file_descriptor, F_SETFL, flags | O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

fn to_sockaddr(address: SocketAddrV4) -> sockaddr_in {
    let mut addr: sockaddr_in = unsafe { mem::zeroed() };
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    {
        addr.sin_len = mem::size_of::<sockaddr_in>() as u8;
    }
    addr.sin_family = AF_INET as libc::sa_family_t;
    addr.sin_port = address.port().to_be();
    addr.sin_addr.s_addr = u32::from(*address.ip()).to_be();
    addr
}

/// Accepts one pending connection and switches it to non-blocking mode.
///
/// Returns `Ok(None)` when the backlog is empty. Interrupted calls are retried.
pub(crate) fn accept_client(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                return Ok(Some((stream, peer)));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
