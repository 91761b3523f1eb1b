//! Response construction, kept behind a small trait so the dispatcher and the
//! pool never see protocol details.
//!
//! The server ships with [`CannedResponse`], which answers every request with
//! the same bytes. Anything implementing [`Responder`] (including a plain
//! closure) can replace it.
//!
//! # Example
//!
//! ```
//! use reactor_server::{Reply, Responder};
//!
//! let echo = |request: &[u8]| Reply::owned(request.to_vec(), false);
//! let reply = echo.respond(b"ping");
//! assert_eq!(reply.bytes(), b"ping");
//! ```

use std::borrow::Cow;

/// The canned success response: status line, `Content-Length: 12`, and `Hello World\n`.
pub const HELLO_WORLD_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nHello World\n";

const CLOSE_INTENT: &[u8] = b"connection: close";

/// What a [`Responder`] wants written back, and whether to hang up afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<'a> {
    bytes: Cow<'a, [u8]>,
    close: bool,
}

impl<'a> Reply<'a> {
    /// A reply borrowing its bytes from the responder.
    pub fn borrowed(bytes: &'a [u8], close: bool) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
            close,
        }
    }

    /// A reply that owns freshly built bytes.
    pub fn owned(bytes: Vec<u8>, close: bool) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
            close,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `true` if the connection should be closed once the reply is written.
    pub fn close(&self) -> bool {
        self.close
    }
}

/// Turns one request's raw bytes into the bytes to send back.
///
/// Called on worker threads, possibly several at once.
pub trait Responder: Send + Sync + 'static {
    fn respond<'a>(&'a self, request: &[u8]) -> Reply<'a>;
}

impl<F> Responder for F
where
    F: Fn(&[u8]) -> Reply<'static> + Send + Sync + 'static,
{
    fn respond<'a>(&'a self, request: &[u8]) -> Reply<'a> {
        self(request)
    }
}

/// Answers every request with the same pre-built response.
///
/// Closes the connection after replying when the request carries
/// `Connection: close` (matched case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedResponse {
    bytes: Vec<u8>,
}

impl CannedResponse {
    /// Builds a `200 OK` response around `body` with a matching `Content-Length`.
    pub fn ok(body: &[u8]) -> Self {
        let mut bytes = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len())
            .into_bytes();
        bytes.extend_from_slice(body);
        Self { bytes }
    }

    /// Uses `bytes` verbatim as the response.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for CannedResponse {
    fn default() -> Self {
        Self::raw(HELLO_WORLD_RESPONSE)
    }
}

impl Responder for CannedResponse {
    fn respond<'a>(&'a self, request: &[u8]) -> Reply<'a> {
        Reply::borrowed(&self.bytes, wants_close(request))
    }
}

/// Returns `true` if the raw request asks for the connection to be closed.
pub fn wants_close(request: &[u8]) -> bool {
    request
        .windows(CLOSE_INTENT.len())
        .any(|window| window.eq_ignore_ascii_case(CLOSE_INTENT))
}
