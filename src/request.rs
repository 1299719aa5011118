//! The request state machine: `ParseHeader → HeaderComplete →
//! HandleGet|HandlePostBegin|HandleUnsupported → ParsePostHeader →
//! PostHeaderComplete → PostData`.
//!
//! Grounded on `client.c`'s `(consumed, error, continue)` per-state
//! contract and `post.c`'s POST arithmetic, which is ported here near
//! verbatim (see `DESIGN.md` for the one deliberate deviation).

use crate::buffer;
use crate::connection::{Connection, ParseState, RequestLine, StrView, MAX_URI_PARAMS};

/// Result of driving the state machine one step: bytes to discard from
/// the head of the receive buffer, whether the step was fatal, and
/// whether the reactor should invoke the (possibly new) state again
/// without waiting for more bytes.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub consumed: usize,
    pub error: bool,
    pub cont: bool,
}

impl StepOutcome {
    fn advance(consumed: usize) -> Self {
        Self {
            consumed,
            error: false,
            cont: true,
        }
    }

    fn wait() -> Self {
        Self {
            consumed: 0,
            error: false,
            cont: false,
        }
    }

    fn fatal() -> Self {
        Self {
            consumed: 0,
            error: true,
            cont: false,
        }
    }
}

enum HeaderLine<'a> {
    Incomplete,
    /// The blank line terminating a header block; bytes to consume (2).
    Empty(usize),
    /// A header entry's bytes (CRLF excluded) and bytes to consume
    /// (`len + 2`).
    Data(&'a [u8], usize),
}

fn next_header_line(buf: &[u8]) -> HeaderLine<'_> {
    match buffer::locate(buf, b"\r\n") {
        None => HeaderLine::Incomplete,
        Some(0) => HeaderLine::Empty(2),
        Some(pos) => HeaderLine::Data(&buf[..pos], pos + 2),
    }
}

/// Computes `sub`'s offset within `base`. `sub` must be a subslice of
/// `base` (guaranteed by `buffer::chop`).
fn view_of(base: &[u8], sub: &[u8]) -> StrView {
    let start = sub.as_ptr() as usize - base.as_ptr() as usize;
    StrView {
        start,
        len: sub.len(),
    }
}

/// Drives `conn`'s current parse state one step forward. Called in a
/// loop by the reactor until it reports `cont = false` or `error =
/// true` (spec §4.5 `handle_receive`).
pub fn drive(conn: &mut Connection) -> StepOutcome {
    match conn.state {
        ParseState::ParseHeader => step_parse_header(conn),
        ParseState::HeaderComplete => step_header_complete(conn),
        ParseState::HandleGet => step_handle_get(conn),
        ParseState::HandleUnsupported => step_handle_unsupported(conn),
        ParseState::HandlePostBegin => step_handle_post_begin(conn),
        ParseState::ParsePostHeader => step_parse_post_header(conn),
        ParseState::PostHeaderComplete => step_post_header_complete(conn),
        ParseState::PostData => step_post_data(conn),
    }
}

fn step_parse_header(conn: &mut Connection) -> StepOutcome {
    match next_header_line(&conn.rx_buffer[..conn.rx_size]) {
        HeaderLine::Incomplete => StepOutcome::wait(),
        HeaderLine::Empty(consumed) => {
            conn.state = ParseState::HeaderComplete;
            StepOutcome::advance(consumed)
        }
        HeaderLine::Data(line, consumed) => {
            let is_request_line = conn.headers.is_empty();
            let mut owned = line.to_vec();
            if !is_request_line {
                owned.make_ascii_lowercase();
            }
            conn.headers.push(String::from_utf8_lossy(&owned).into_owned());
            StepOutcome::advance(consumed)
        }
    }
}

fn step_header_complete(conn: &mut Connection) -> StepOutcome {
    if conn.headers.is_empty() {
        return StepOutcome::fatal();
    }
    let line = conn.headers[0].clone();
    let bytes = line.as_bytes();
    let mut cursor = bytes;

    let method = match buffer::chop(&mut cursor, b" ") {
        Some(m) => view_of(bytes, m),
        None => return StepOutcome::fatal(),
    };
    let target = match buffer::chop(&mut cursor, b" ") {
        Some(t) => view_of(bytes, t),
        None => return StepOutcome::fatal(),
    };
    if cursor.is_empty() {
        return StepOutcome::fatal();
    }
    let version = view_of(bytes, cursor);

    let mut query_params = Vec::new();
    let target_str = target.resolve(&line);
    if let Some(qpos) = target_str.find('?') {
        let query_start = target.start + qpos + 1;
        let query_end = target.start + target.len;
        let mut qcursor = &bytes[query_start..query_end];
        while query_params.len() < MAX_URI_PARAMS {
            match buffer::chop(&mut qcursor, b"&") {
                Some(seg) => query_params.push(view_of(bytes, seg)),
                None => {
                    if !qcursor.is_empty() {
                        query_params.push(view_of(bytes, qcursor));
                    }
                    break;
                }
            }
        }
    }

    let method_str = method.resolve(&line).to_string();
    conn.request_line = Some(RequestLine {
        method,
        target,
        version,
        query_params,
    });

    conn.state = match method_str.as_str() {
        "GET" => ParseState::HandleGet,
        "POST" => ParseState::HandlePostBegin,
        _ => ParseState::HandleUnsupported,
    };
    StepOutcome::advance(0)
}

fn step_handle_get(conn: &mut Connection) -> StepOutcome {
    let config = conn.config.clone();
    let line = conn.headers[0].clone();
    let rl = conn
        .request_line
        .clone()
        .expect("HandleGet reached with no parsed request line");
    let target = rl.target.resolve(&line).to_string();
    let params: Vec<String> = rl
        .query_params
        .iter()
        .map(|v| v.resolve(&line).to_string())
        .collect();
    let param_refs: Vec<&str> = params.iter().map(String::as_str).collect();
    let source_address = conn.source_address.clone();

    let mut matched = false;
    for entry in &config.get_handlers {
        if target.as_bytes().starts_with(entry.uri.as_bytes()) {
            matched = true;
            (entry.handler)(conn, &target, &param_refs, &source_address);
        }
    }
    if !matched {
        if let Some(handler) = &config.default_get_handler {
            (handler)(conn, &target, &param_refs, &source_address);
        }
    }

    conn.reset_state();
    StepOutcome::advance(0)
}

fn step_handle_unsupported(conn: &mut Connection) -> StepOutcome {
    mhttpd_log::warn!("unsupported method from {}", conn.source_address);
    conn.reset_state();
    StepOutcome::advance(0)
}

fn step_handle_post_begin(conn: &mut Connection) -> StepOutcome {
    let mut content_length = 0usize;
    for header in conn.headers.iter().skip(1) {
        if let Some(rest) = header.strip_prefix("content-length: ") {
            content_length = rest.trim().parse().unwrap_or(0);
            break;
        }
    }
    conn.post.content_length = content_length;
    conn.post.content_remaining = content_length;
    conn.state = ParseState::ParsePostHeader;
    StepOutcome::advance(0)
}

fn step_parse_post_header(conn: &mut Connection) -> StepOutcome {
    match next_header_line(&conn.rx_buffer[..conn.rx_size]) {
        HeaderLine::Incomplete => StepOutcome::wait(),
        HeaderLine::Empty(consumed) => {
            conn.post.content_remaining = conn.post.content_remaining.saturating_sub(consumed);
            conn.state = ParseState::PostHeaderComplete;
            StepOutcome::advance(consumed)
        }
        HeaderLine::Data(line, consumed) => {
            conn.post_headers
                .push(String::from_utf8_lossy(line).into_owned());
            conn.post.content_remaining = conn.post.content_remaining.saturating_sub(consumed);
            StepOutcome::advance(consumed)
        }
    }
}

fn step_post_header_complete(conn: &mut Connection) -> StepOutcome {
    let config = conn.config.clone();
    let boundary = conn.headers.iter().skip(1).find_map(|h| {
        h.find("boundary=")
            .map(|i| h[i + "boundary=".len()..].to_string())
    });
    if boundary.is_none() {
        mhttpd_log::warn!(
            "POST from {} has no multipart boundary",
            conn.source_address
        );
    }

    let filename = conn.post_headers.iter().find_map(|h| {
        h.find("filename=\"").and_then(|i| {
            let rest = &h[i + "filename=\"".len()..];
            rest.find('"').map(|end| rest[..end].to_string())
        })
    });

    let header_length = conn
        .post
        .content_length
        .saturating_sub(conn.post.content_remaining);
    let trailer_length = boundary.as_ref().map(String::len).unwrap_or(0);
    conn.post.trailer_length = trailer_length;
    conn.post.filename = filename;
    conn.post.boundary = boundary;

    match conn
        .post
        .content_length
        .checked_sub(header_length + trailer_length)
    {
        Some(effective) => conn.post.content_length = effective,
        None => {
            mhttpd_log::warn!(
                "POST framing underflow from {}: header_length={} trailer_length={} content_length={}",
                conn.source_address,
                header_length,
                trailer_length,
                conn.post.content_length
            );
        }
    }

    if let Some(handler) = &config.post_handler {
        let uri = current_target(conn);
        let filename = conn.post.filename.clone();
        let source_address = conn.source_address.clone();
        let total_length = conn.post.content_length;
        (handler)(
            conn,
            &uri,
            filename.as_deref(),
            &source_address,
            true,
            false,
            &[],
            total_length,
        );
    }

    conn.state = ParseState::PostData;
    StepOutcome::advance(0)
}

fn step_post_data(conn: &mut Connection) -> StepOutcome {
    let config = conn.config.clone();
    let handled = conn.post.content_remaining.min(conn.rx_size);
    conn.post.content_remaining -= handled;

    let mut portion = handled;
    if conn.post.content_remaining < conn.post.trailer_length {
        let overhang = conn.post.trailer_length - conn.post.content_remaining;
        portion = portion.saturating_sub(overhang);
    }

    if portion > 0 {
        if let Some(handler) = &config.post_handler {
            let uri = current_target(conn);
            let filename = conn.post.filename.clone();
            let source_address = conn.source_address.clone();
            let total_length = conn.post.content_length;
            let data = conn.rx_buffer[..portion].to_vec();
            (handler)(
                conn,
                &uri,
                filename.as_deref(),
                &source_address,
                false,
                false,
                &data,
                total_length,
            );
        }
    }

    let consumed = handled;
    if conn.post.content_remaining == 0 {
        if let Some(handler) = &config.post_handler {
            let uri = current_target(conn);
            let filename = conn.post.filename.clone();
            let source_address = conn.source_address.clone();
            let total_length = conn.post.content_length;
            (handler)(
                conn,
                &uri,
                filename.as_deref(),
                &source_address,
                false,
                true,
                &[],
                total_length,
            );
        }
        conn.reset_state();
        StepOutcome::advance(consumed)
    } else {
        StepOutcome {
            consumed,
            error: false,
            cont: false,
        }
    }
}

fn current_target(conn: &Connection) -> String {
    conn.request_line
        .as_ref()
        .map(|rl| rl.target.resolve(&conn.headers[0]).to_string())
        .unwrap_or_default()
}
