//! Per-client state: socket, receive buffer, parse-state selector,
//! parsed-header view, and POST progress.
//!
//! Grounded on `microhttpd_private.h`'s `md_client_t` and `client.c`'s
//! client lifecycle, adapted to owned `Vec`s and offset/length views
//! instead of raw pointers into a malloc'd buffer.

use std::sync::Arc;

use mio::net::TcpStream;
use mio::Token;

use crate::config::Config;

pub const MAX_URI_PARAMS: usize = 20;
pub const MAX_HTTP_HEADER_OPTIONS: usize = 20;
pub const MAX_SOURCE_ADDRESS_LENGTH: usize = 30;

/// An offset/length pair into `headers[0]` (the request line). This is
/// the safe-Rust stand-in for the original's raw pointers into the
/// receive buffer: resolving a view never borrows `Connection`, so it
/// carries no lifetime of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrView {
    pub start: usize,
    pub len: usize,
}

impl StrView {
    pub fn resolve<'a>(&self, line: &'a str) -> &'a str {
        &line[self.start..self.start + self.len]
    }
}

#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: StrView,
    pub target: StrView,
    pub version: StrView,
    pub query_params: Vec<StrView>,
}

/// Parser state selector (spec §4.3). A tagged enum dispatched by a
/// single `match`, standing in for the original's function-pointer
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ParseHeader,
    HeaderComplete,
    HandleGet,
    HandlePostBegin,
    HandleUnsupported,
    ParsePostHeader,
    PostHeaderComplete,
    PostData,
}

/// POST sub-state, live only between `HandlePostBegin` and the next
/// `reset_state`.
#[derive(Debug, Clone, Default)]
pub struct PostState {
    pub content_length: usize,
    pub content_remaining: usize,
    pub boundary: Option<String>,
    pub filename: Option<String>,
    pub trailer_length: usize,
}

pub struct Connection {
    pub token: Token,
    pub stream: TcpStream,
    pub source_address: String,

    pub rx_buffer: Box<[u8]>,
    pub rx_size: usize,

    pub state: ParseState,
    pub headers: Vec<String>,
    pub post_headers: Vec<String>,
    pub request_line: Option<RequestLine>,
    pub post: PostState,

    /// Shared, read-only: the handler tables and tuning values fixed at
    /// server start. Cheap to clone (an `Arc` bump) whenever a borrow of
    /// `Connection` must be released before a handler call.
    pub config: Arc<Config>,

    /// Set when the reactor should drop this connection after the
    /// current tick's processing completes.
    pub should_evict: bool,
}

impl Connection {
    pub fn new(token: Token, stream: TcpStream, rx_buffer_size: usize, config: Arc<Config>) -> Self {
        let source_address = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "0.0.0.0:0".to_string());
        let source_address = if source_address.len() > MAX_SOURCE_ADDRESS_LENGTH {
            source_address[..MAX_SOURCE_ADDRESS_LENGTH].to_string()
        } else {
            source_address
        };
        Self {
            token,
            stream,
            source_address,
            rx_buffer: vec![0u8; rx_buffer_size].into_boxed_slice(),
            rx_size: 0,
            state: ParseState::ParseHeader,
            headers: Vec::new(),
            post_headers: Vec::new(),
            request_line: None,
            post: PostState::default(),
            config,
            should_evict: false,
        }
    }

    /// Clears parsed state and returns to `ParseHeader`, preserving the
    /// invariant that request-line views and the header-entry list are
    /// dropped together (invariant 3).
    pub fn reset_state(&mut self) {
        self.headers.clear();
        self.post_headers.clear();
        self.request_line = None;
        self.post = PostState::default();
        self.state = ParseState::ParseHeader;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_view_resolves_substring() {
        let line = "GET /test HTTP/1.1";
        let view = StrView { start: 4, len: 5 };
        assert_eq!(view.resolve(line), "/test");
    }
}
