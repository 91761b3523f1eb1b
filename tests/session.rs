mod common;

use common::{
    TestServer, body, connect, content_length, exchange, local, read_until_closed,
};
use reactor_server::{HELLO_WORLD_RESPONSE, Reply};
use std::io::{Read, Write};
use std::net::Shutdown;

const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
const CLOSE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";

#[test]
fn every_request_gets_the_canned_response() {
    let server = TestServer::start(local().workers(2));
    let mut client = connect(server.addr);

    let response = exchange(&mut client, REQUEST);

    assert_eq!(response, HELLO_WORLD_RESPONSE);
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(content_length(&response), Some(12));
    assert_eq!(body(&response), b"Hello World\n");

    server.shutdown().expect("clean shutdown");
}

#[test]
fn connection_stays_open_between_requests() {
    let server = TestServer::start(local().workers(2));
    let mut client = connect(server.addr);

    for _ in 0..5 {
        assert_eq!(exchange(&mut client, REQUEST), HELLO_WORLD_RESPONSE);
    }

    // Any bytes count as a request.
    assert_eq!(exchange(&mut client, b"x"), HELLO_WORLD_RESPONSE);

    server.shutdown().expect("clean shutdown");
}

#[test]
fn close_intent_closes_after_the_response() {
    let server = TestServer::start(local().workers(1));
    let mut client = connect(server.addr);

    client.write_all(CLOSE_REQUEST).expect("write request");
    let received = read_until_closed(&mut client);

    assert_eq!(received, HELLO_WORLD_RESPONSE);

    server.shutdown().expect("clean shutdown");
}

#[test]
fn close_intent_after_keep_alive_requests() {
    let server = TestServer::start(local().workers(1));
    let mut client = connect(server.addr);

    assert_eq!(exchange(&mut client, REQUEST), HELLO_WORLD_RESPONSE);
    client
        .write_all(b"GET / HTTP/1.1\r\nconnection: CLOSE\r\n\r\n")
        .expect("write request");

    assert_eq!(read_until_closed(&mut client), HELLO_WORLD_RESPONSE);

    server.shutdown().expect("clean shutdown");
}

#[test]
fn silent_peer_gets_nothing_and_others_are_unaffected() {
    let server = TestServer::start(local().workers(1));

    let mut silent = connect(server.addr);
    silent.shutdown(Shutdown::Write).expect("half close");
    assert!(read_until_closed(&mut silent).is_empty());

    let mut active = connect(server.addr);
    assert_eq!(exchange(&mut active, REQUEST), HELLO_WORLD_RESPONSE);

    server.shutdown().expect("clean shutdown");
}

#[test]
fn each_read_is_answered_as_its_own_request() {
    let server = TestServer::start(local().workers(1));
    let mut client = connect(server.addr);

    // The first fragment is answered before the second one is even sent.
    assert_eq!(exchange(&mut client, b"GET / HT"), HELLO_WORLD_RESPONSE);
    assert_eq!(
        exchange(&mut client, b"TP/1.1\r\n\r\n"),
        HELLO_WORLD_RESPONSE
    );

    server.shutdown().expect("clean shutdown");
}

#[test]
fn custom_responder_replaces_canned_response() {
    let echo = |request: &[u8]| {
        let close = request.starts_with(b"bye");
        Reply::owned(request.to_ascii_uppercase(), close)
    };
    let server = TestServer::start_with(local().workers(2), echo);
    let mut client = connect(server.addr);

    client.write_all(b"ping").expect("write ping");
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).expect("read pong");
    assert_eq!(&buf, b"PING");

    client.write_all(b"bye").expect("write bye");
    assert_eq!(read_until_closed(&mut client), b"BYE");

    server.shutdown().expect("clean shutdown");
}

#[test]
fn large_replies_are_written_completely() {
    let payload = vec![7u8; 4 * 1024 * 1024];
    let expected = payload.len();
    let server = TestServer::start_with(local().workers(1), move |_: &[u8]| {
        Reply::owned(payload.clone(), true)
    });
    let mut client = connect(server.addr);

    client.write_all(b"send it").expect("write request");
    let received = read_until_closed(&mut client);

    assert_eq!(received.len(), expected);
    assert!(received.iter().all(|&byte| byte == 7));

    server.shutdown().expect("clean shutdown");
}

#[test]
fn per_turn_limit_still_serves_every_request() {
    let server = TestServer::start(local().workers(1).max_requests_per_turn(1));
    let mut first = connect(server.addr);
    let mut second = connect(server.addr);

    for _ in 0..3 {
        assert_eq!(exchange(&mut first, REQUEST), HELLO_WORLD_RESPONSE);
        assert_eq!(exchange(&mut second, REQUEST), HELLO_WORLD_RESPONSE);
    }

    server.shutdown().expect("clean shutdown");
}

#[test]
fn panicking_responder_closes_only_its_connection() {
    let responder = |request: &[u8]| {
        if request.starts_with(b"boom") {
            panic!("responder refused the request");
        }
        Reply::borrowed(HELLO_WORLD_RESPONSE, false)
    };
    let server = TestServer::start_with(local().workers(1), responder);

    let mut doomed = connect(server.addr);
    doomed.write_all(b"boom").expect("write request");
    assert!(read_until_closed(&mut doomed).is_empty());

    // The single worker survived and keeps serving.
    let mut healthy = connect(server.addr);
    for _ in 0..2 {
        assert_eq!(exchange(&mut healthy, REQUEST), HELLO_WORLD_RESPONSE);
    }

    server.shutdown().expect("clean shutdown");
}
