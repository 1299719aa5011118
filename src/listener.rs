//! Non-blocking listening socket setup.
//!
//! Grounded on `microhttpd.c`'s `microhttpd_start`: create, set
//! `SO_REUSEADDR`, bind, set non-blocking, listen with a fixed backlog.
//! `mio::net::TcpSocket` gives us that same ordering without reaching
//! into `libc` directly.

use std::net::SocketAddr;

use mio::net::{TcpListener, TcpSocket};

use crate::error::StartError;

/// Matches the original's `MICROHTTPD_MAX_QUEUED_CONNECTIONS`.
pub const MAX_QUEUED_CONNECTIONS: u32 = 10;

pub fn bind(port: u16) -> Result<TcpListener, StartError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = TcpSocket::new_v4().map_err(StartError::Bind)?;
    if let Err(e) = socket.set_reuseaddr(true) {
        mhttpd_log::warn!("failed to enable SO_REUSEADDR: {e}");
    }
    socket.bind(addr).map_err(StartError::Bind)?;
    socket
        .listen(MAX_QUEUED_CONNECTIONS)
        .map_err(StartError::Listen)
}
