//! The reactor: a single-threaded `mio::Poll` loop that accepts
//! connections, drives each one's request state machine on
//! readiness, and evicts connections that misbehave.
//!
//! Grounded on `microhttpd.c`'s `microhttpd_process` (wait-then-drain
//! tick shape) and `client.c`'s `microhttpd_HandleClientReceive` (the
//! consumed/error/continue receive loop); the connection table itself
//! follows the teacher's `http_connection.rs` read/write-phase split,
//! generalized from its per-event-loop `HashMap<Token, HttpConnection>`.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{EvictReason, ProcessError, StartError};
use crate::request;
use crate::{buffer, listener};

const LISTENER_TOKEN: Token = Token(0);

/// Owns the listening socket, the poller, and every live connection.
/// `process` drives one readiness wait; callers loop it for the
/// lifetime of the process (spec §4.5).
pub struct Server {
    config: Arc<Config>,
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    running: bool,
}

impl Server {
    /// Validates `config`, binds and registers the listening socket,
    /// and returns a server ready for repeated [`Server::process`]
    /// calls. Mirrors `microhttpd_start`.
    pub fn start(config: Config) -> Result<Self, StartError> {
        config
            .validate()
            .map_err(|_| StartError::InvalidConfig("rx_buffer_size must be > 0"))?;

        let mut listener_socket = listener::bind(config.server_port)?;
        let poll = Poll::new().map_err(StartError::Register)?;
        poll.registry()
            .register(&mut listener_socket, LISTENER_TOKEN, Interest::READABLE)
            .map_err(StartError::Register)?;

        Ok(Self {
            config: Arc::new(config),
            poll,
            events: Events::with_capacity(128),
            listener: listener_socket,
            connections: HashMap::new(),
            next_token: 1,
            running: true,
        })
    }

    /// Waits up to `config.process_timeout_ms` for readiness, then
    /// drains every ready connection followed by at most one accepted
    /// connection. Returns once the wait completes; callers re-invoke
    /// in a loop.
    pub fn process(&mut self) -> Result<(), ProcessError> {
        if !self.running {
            return Err(ProcessError::NotRunning);
        }

        let timeout = Duration::from_millis(self.config.process_timeout_ms);
        self.poll
            .poll(&mut self.events, Some(timeout))
            .map_err(ProcessError::Poll)?;

        let ready: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
        for token in ready {
            if token == LISTENER_TOKEN {
                self.accept_one();
                continue;
            }
            self.handle_receive(token);
        }

        self.connections.retain(|_, conn| !conn.should_evict);
        Ok(())
    }

    /// Stops future `process` calls from waiting on the poller. Does
    /// not close existing connections.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((mut stream, _addr)) => {
                let token = Token(self.next_token);
                self.next_token += 1;

                if let Err(e) = self
                    .poll
                    .registry()
                    .register(&mut stream, token, Interest::READABLE)
                {
                    mhttpd_log::warn!("failed to register accepted connection: {e}");
                    return;
                }

                let conn = Connection::new(
                    token,
                    stream,
                    self.config.rx_buffer_size,
                    self.config.clone(),
                );
                mhttpd_log::info!("accepted connection from {}", conn.source_address);
                self.connections.insert(token, conn);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                mhttpd_log::warn!("accept failed: {e}");
            }
        }
    }

    /// Reads whatever is available from `token`'s socket into its
    /// receive buffer, then drives the parse state machine until it
    /// stalls (`cont == false`) or faults (`error == true`).
    fn handle_receive(&mut self, token: Token) {
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };

        let space_left = conn.rx_buffer.len() - conn.rx_size;
        if space_left == 0 {
            mhttpd_log::warn!(
                "evicting {}: {}",
                conn.source_address,
                EvictReason::BufferOverrun
            );
            conn.should_evict = true;
            return;
        }

        match conn.stream.read(&mut conn.rx_buffer[conn.rx_size..]) {
            Ok(0) => {
                mhttpd_log::debug!("{} closed the connection", conn.source_address);
                conn.should_evict = true;
                return;
            }
            Ok(n) => conn.rx_size += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                mhttpd_log::warn!("read failed for {}: {e}", conn.source_address);
                conn.should_evict = true;
                return;
            }
        }

        loop {
            let outcome = request::drive(conn);

            if outcome.error {
                mhttpd_log::warn!(
                    "evicting {}: {}",
                    conn.source_address,
                    EvictReason::ParseFatal
                );
                conn.should_evict = true;
                return;
            }

            if outcome.consumed > 0 {
                if conn.rx_size < outcome.consumed {
                    mhttpd_log::warn!(
                        "evicting {}: {}",
                        conn.source_address,
                        EvictReason::Underrun
                    );
                    conn.should_evict = true;
                    return;
                }
                buffer::shift(&mut conn.rx_buffer, outcome.consumed, conn.rx_size);
                conn.rx_size -= outcome.consumed;
            }

            if conn.should_evict || !outcome.cont {
                break;
            }
        }
    }
}
