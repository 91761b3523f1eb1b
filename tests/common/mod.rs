#![allow(dead_code)]

use reactor_server::{
    Error, HELLO_WORLD_RESPONSE, Responder, ServerBuilder, State, StopHandle,
};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A server running its dispatcher loop on a background thread.
pub struct TestServer {
    pub addr: SocketAddr,
    pub stop: StopHandle,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

impl TestServer {
    pub fn start(builder: ServerBuilder) -> Self {
        let server = builder.bind().expect("bind server");
        Self::spawn(server)
    }

    pub fn start_with<R: Responder>(builder: ServerBuilder, responder: R) -> Self {
        let server = builder.bind_with(responder).expect("bind server");
        Self::spawn(server)
    }

    fn spawn(server: reactor_server::Server) -> Self {
        let addr = server.local_addr().expect("local addr");
        let stop = server.stop_handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            stop,
            thread: Some(thread),
        }
    }

    /// Stops the server and waits for `run` to return.
    pub fn shutdown(mut self) -> Result<(), Error> {
        self.stop.stop();
        self.join()
    }

    pub fn join(&mut self) -> Result<(), Error> {
        let thread = self.thread.take().expect("server already joined");
        let outcome = thread.join().expect("server thread panicked");
        assert_eq!(self.stop.state(), State::Stopped);
        outcome
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop.stop();
            let _ = thread.join();
        }
    }
}

/// Loopback builder on an OS-assigned port.
pub fn local() -> ServerBuilder {
    ServerBuilder::new().host(Ipv4Addr::LOCALHOST).port(0)
}

pub fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(IO_TIMEOUT)).expect("read timeout");
    stream.set_write_timeout(Some(IO_TIMEOUT)).expect("write timeout");
    stream
}

pub fn read_hello(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; HELLO_WORLD_RESPONSE.len()];
    stream.read_exact(&mut buf).expect("read response");
    buf
}

/// Sends `request` and reads back one canned response.
pub fn exchange(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream.write_all(request).expect("write request");
    read_hello(stream)
}

/// Reads until the peer closes, returning everything received.
pub fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    stream.read_to_end(&mut received).expect("read to end");
    received
}

pub fn content_length(response: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(response).ok()?;
    let (head, _) = text.split_once("\r\n\r\n")?;
    head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

pub fn body(response: &[u8]) -> &[u8] {
    let split = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("header terminator");
    &response[split + 4..]
}

/// Reads until the peer closes or resets the connection.
///
/// Connections still waiting in the accept backlog when the listener closes
/// are reset rather than shut down cleanly.
pub fn read_until_gone(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return received,
            Ok(n_read) => received.extend_from_slice(&buf[..n_read]),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == std::io::ErrorKind::ConnectionReset => return received,
            Err(err) => panic!("read failed: {err}"),
        }
    }
}
