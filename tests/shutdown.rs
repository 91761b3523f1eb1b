mod common;

use common::{
    TestServer, connect, exchange, local, read_hello, read_until_closed, read_until_gone,
};
use reactor_server::{CannedResponse, HELLO_WORLD_RESPONSE, Reply, Responder, State};
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\r\n";

/// Canned responder that reports when it starts and takes a while to answer.
struct SlowResponder {
    canned: CannedResponse,
    delay: Duration,
    entered: Mutex<mpsc::Sender<()>>,
}

impl Responder for SlowResponder {
    fn respond<'a>(&'a self, request: &[u8]) -> Reply<'a> {
        let _ = self.entered.lock().unwrap().send(());
        thread::sleep(self.delay);
        self.canned.respond(request)
    }
}

/// Canned responder that records the highest number of concurrent calls.
struct CountingResponder {
    canned: CannedResponse,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Responder for CountingResponder {
    fn respond<'a>(&'a self, request: &[u8]) -> Reply<'a> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.canned.respond(request)
    }
}

#[test]
fn stopping_twice_has_the_effect_of_once() {
    let mut server = TestServer::start(local().workers(2));
    let mut client = connect(server.addr);
    assert_eq!(exchange(&mut client, REQUEST), HELLO_WORLD_RESPONSE);

    assert!(server.stop.stop());
    assert!(!server.stop.stop());

    server.join().expect("clean shutdown");
    assert!(!server.stop.stop());
    assert_eq!(server.stop.state(), State::Stopped);
}

#[test]
fn stop_before_run_returns_immediately() {
    let server = local().workers(1).bind().expect("bind");
    let stop = server.stop_handle();
    assert_eq!(server.state(), State::Running);

    assert!(stop.stop());
    server.run().expect("clean shutdown");

    assert_eq!(stop.state(), State::Stopped);
}

#[test]
fn listener_is_closed_after_run_returns() {
    let server = TestServer::start(local().workers(1));
    let addr = server.addr;

    server.shutdown().expect("clean shutdown");

    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn connections_arriving_while_draining_are_never_served() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let responder = SlowResponder {
        canned: CannedResponse::default(),
        delay: Duration::from_millis(800),
        entered: Mutex::new(entered_tx),
    };
    let mut server = TestServer::start_with(local().workers(1), responder);

    let mut in_flight = connect(server.addr);
    in_flight.write_all(REQUEST).expect("write request");
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("session started");

    assert!(server.stop.stop());

    // The listener socket still exists while the worker finishes, so the
    // kernel completes the handshake, but nothing accepts the connection.
    let mut late = connect(server.addr);
    late.write_all(REQUEST).expect("write request");

    server.join().expect("clean shutdown");

    assert_eq!(read_until_closed(&mut in_flight), HELLO_WORLD_RESPONSE);
    assert!(read_until_gone(&mut late).is_empty());
    assert!(entered_rx.try_recv().is_err(), "late connection reached the responder");
}

#[test]
fn bounded_queue_still_serves_every_client() {
    let workers = 1;
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let responder = CountingResponder {
        canned: CannedResponse::default(),
        active: active.clone(),
        peak: peak.clone(),
    };
    let server =
        TestServer::start_with(local().workers(workers).queue_capacity(1), responder);
    let addr = server.addr;

    let clients: Vec<_> = (0..5)
        .map(|_| {
            thread::spawn(move || {
                let mut client = connect(addr);
                let mut responses = Vec::new();
                for _ in 0..2 {
                    responses.push(exchange(&mut client, REQUEST));
                }
                responses
            })
        })
        .collect();

    for client in clients {
        for response in client.join().expect("client thread") {
            assert_eq!(response, HELLO_WORLD_RESPONSE);
        }
    }

    assert_eq!(peak.load(Ordering::SeqCst), workers);

    server.shutdown().expect("clean shutdown");
}

#[test]
fn idle_connections_are_closed_on_shutdown() {
    let server = TestServer::start(local().workers(1));
    let mut client = connect(server.addr);
    assert_eq!(exchange(&mut client, REQUEST), HELLO_WORLD_RESPONSE);

    server.shutdown().expect("clean shutdown");

    assert!(read_until_closed(&mut client).is_empty());
}

#[test]
fn in_flight_sessions_finish_before_run_returns() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let responder = SlowResponder {
        canned: CannedResponse::default(),
        delay: Duration::from_millis(300),
        entered: Mutex::new(entered_tx),
    };
    let server = TestServer::start_with(local().workers(2), responder);

    let mut clients: Vec<TcpStream> = (0..2).map(|_| connect(server.addr)).collect();
    for client in &mut clients {
        client.write_all(REQUEST).expect("write request");
    }
    for _ in 0..2 {
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("session started");
    }

    server.shutdown().expect("clean shutdown");

    for client in &mut clients {
        assert_eq!(read_until_closed(client), HELLO_WORLD_RESPONSE);
    }
}

#[test]
fn readable_connections_beyond_pool_size_wait_for_a_worker() {
    let workers = 2;
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let responder = CountingResponder {
        canned: CannedResponse::default(),
        active: active.clone(),
        peak: peak.clone(),
    };
    let server = TestServer::start_with(local().workers(workers), responder);
    let addr = server.addr;

    let clients: Vec<_> = (0..6)
        .map(|_| {
            thread::spawn(move || {
                let mut client = connect(addr);
                client.write_all(REQUEST).expect("write request");
                read_hello(&mut client)
            })
        })
        .collect();

    for client in clients {
        assert_eq!(client.join().expect("client thread"), HELLO_WORLD_RESPONSE);
    }

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= workers, "peak concurrency {peak} exceeded {workers}");
    assert_eq!(active.load(Ordering::SeqCst), 0);

    server.shutdown().expect("clean shutdown");
}
