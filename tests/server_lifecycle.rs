//! End-to-end exercises of [`mhttpd::Server`] over real loopback
//! sockets: a client connects, a request is sent, `process()` ticks
//! are driven until the expected response (or eviction) is observed.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mhttpd::{Config, Server, HTTP_OK};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn drive_until<F: FnMut() -> bool>(server: &mut Server, mut done: F) {
    for _ in 0..200 {
        server.process().unwrap();
        if done() {
            return;
        }
    }
    panic!("condition never became true within the tick budget");
}

#[test]
fn get_request_receives_registered_response() {
    let port = free_port();
    let hits = Arc::new(Mutex::new(0usize));
    let hits2 = hits.clone();

    let config = Config::new(port)
        .with_process_timeout_ms(20)
        .with_get_handler(
            "/hello",
            Arc::new(move |conn, _target, _params, _src| {
                *hits2.lock().unwrap() += 1;
                let body = b"hi there";
                let _ = mhttpd::send_response(
                    conn,
                    HTTP_OK,
                    Some("text/plain"),
                    body.len(),
                    None,
                    Some(body),
                );
            }),
        );

    let mut server = Server::start(config).expect("server should start");

    let mut client = TcpStream::connect(("127.0.0.1", port)).expect("client should connect");
    client
        .write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n")
        .unwrap();
    client.set_read_timeout(Some(Duration::from_millis(50))).unwrap();

    drive_until(&mut server, || *hits.lock().unwrap() == 1);

    let mut buf = [0u8; 256];
    let mut received = Vec::new();
    loop {
        match client.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200\r\n"));
    assert!(text.ends_with("hi there"));
}

#[test]
fn unregistered_route_falls_through_to_default_handler() {
    let port = free_port();
    let default_hits = Arc::new(Mutex::new(0usize));
    let default_hits2 = default_hits.clone();

    let config = Config::new(port)
        .with_process_timeout_ms(20)
        .with_get_handler("/known", Arc::new(|_conn, _t, _p, _s| {}))
        .with_default_get_handler(Arc::new(move |conn, _target, _params, _src| {
            *default_hits2.lock().unwrap() += 1;
            let _ = mhttpd::send_response(conn, mhttpd::HTTP_NOT_FOUND, None, 0, None, None);
        }));

    let mut server = Server::start(config).expect("server should start");
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.write_all(b"GET /unknown HTTP/1.1\r\n\r\n").unwrap();

    drive_until(&mut server, || *default_hits.lock().unwrap() == 1);
}

#[test]
fn sequential_reuse_handles_a_second_request_on_the_same_connection() {
    let port = free_port();
    let hits = Arc::new(Mutex::new(0usize));
    let hits2 = hits.clone();

    let config = Config::new(port)
        .with_process_timeout_ms(20)
        .with_get_handler(
            "/ping",
            Arc::new(move |conn, _target, _params, _src| {
                *hits2.lock().unwrap() += 1;
                let _ = mhttpd::send_response(conn, HTTP_OK, None, 0, None, None);
            }),
        );

    let mut server = Server::start(config).expect("server should start");
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();

    client.write_all(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
    drive_until(&mut server, || *hits.lock().unwrap() == 1);

    client.write_all(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
    drive_until(&mut server, || *hits.lock().unwrap() == 2);
}

#[test]
fn buffer_overrun_evicts_the_connection() {
    let port = free_port();
    let config = Config::new(port)
        .with_process_timeout_ms(20)
        .with_rx_buffer_size(16);

    let mut server = Server::start(config).expect("server should start");
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    // No CRLF anywhere: the header line never completes, so the tiny
    // buffer fills and the connection must be evicted rather than
    // panic on an out-of-space write.
    client.write_all(&[b'x'; 64]).unwrap();

    for _ in 0..50 {
        server.process().unwrap();
    }
    assert_eq!(server.connection_count(), 0);
}
