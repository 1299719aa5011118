//! Response writer: `send_response` builds the status line and fixed
//! headers, `send_data` streams a body while interpolating SSI
//! directives (`<!--#echo var="NAME" -->`) on the fly.
//!
//! Grounded on spec.md §4.2 for the exact header set/ordering and on
//! `microhttpd.c`'s `RESPONSE_HEADER` format string for the wire text;
//! the teacher's own `http/response.rs` buffers a whole response behind
//! a `HashMap` and a reason phrase, which does not fit this core's
//! deterministic, streaming, no-reason-phrase contract, so this module
//! is written fresh rather than adapted from it.

use std::io::Write;

use crate::buffer;
use crate::connection::Connection;
use crate::error::EvictReason;

pub const SSI_TAG_MAX_LENGTH: usize = 128;
pub const MAX_SEND_LENGTH: usize = 1_048_576;

const SSI_OPEN: &[u8] = b"<!--#echo var=\"";
const SSI_CLOSE: &[u8] = b" -->";

pub const HTTP_CONTINUE: u16 = 100;
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_ACCEPTED: u16 = 202;
pub const HTTP_FOUND: u16 = 302;
pub const HTTP_TEMPORARY_REDIRECT: u16 = 307;
pub const HTTP_PERMANENT_REDIRECT: u16 = 308;
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_UNAUTHORIZED: u16 = 401;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;

/// Writes a status line, the fixed header block, optional extra
/// headers, an optional `Content-Type`, the blank line separating
/// headers from body, and (if `body` is given and `content_length >
/// 0`) the body via [`send_data`].
///
/// On any write failure the connection is marked for eviction and the
/// error is returned; callers should stop touching `conn` afterward.
pub fn send_response(
    conn: &mut Connection,
    status: u16,
    content_type: Option<&str>,
    content_length: usize,
    extra_headers: Option<&str>,
    body: Option<&[u8]>,
) -> Result<(), EvictReason> {
    let mut head = format!(
        "HTTP/1.1 {status}\r\n\
         Server: microhttpd\r\n\
         Cache-control: no-cache\r\n\
         Pragma: no-cache\r\n\
         Accept-Ranges: bytes\r\n\
         Content-Length: {content_length}\r\n"
    );
    if let Some(extra) = extra_headers {
        head.push_str(extra);
    }
    if let Some(ct) = content_type {
        head.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    head.push_str("\r\n");

    write_all(conn, head.as_bytes())?;

    if let (Some(body), true) = (body, content_length > 0) {
        return send_data(conn, content_length, body);
    }
    Ok(())
}

/// Writes exactly `length` bytes of `body` (or `body.len()` if `length
/// == 0`), substituting any `<!--#echo var="NAME" -->` directives
/// found along the way via `conn`'s configured SSI handler. Bounded by
/// [`MAX_SEND_LENGTH`].
pub fn send_data(conn: &mut Connection, length: usize, body: &[u8]) -> Result<(), EvictReason> {
    let config = conn.config.clone();
    let mut length = if length == 0 { body.len() } else { length };
    if length > MAX_SEND_LENGTH {
        mhttpd_log::warn!(
            "send_data length {} exceeds MAX_SEND_LENGTH, clipping",
            length
        );
        length = MAX_SEND_LENGTH;
    }
    let body = &body[..length.min(body.len())];

    let mut rest = body;
    loop {
        match buffer::locate(rest, SSI_OPEN) {
            None => {
                write_all(conn, rest)?;
                return Ok(());
            }
            Some(pos) => {
                write_all(conn, &rest[..pos])?;
                let after_open = &rest[pos + SSI_OPEN.len()..];
                let name_end = match buffer::locate(after_open, b"\"") {
                    Some(p) => p.min(SSI_TAG_MAX_LENGTH),
                    None => {
                        conn.should_evict = true;
                        return Err(EvictReason::SsiUnterminated);
                    }
                };
                let var_name = String::from_utf8_lossy(&after_open[..name_end]).into_owned();

                let quote_end = match buffer::locate(after_open, b"\"") {
                    Some(p) => p,
                    None => {
                        conn.should_evict = true;
                        return Err(EvictReason::SsiUnterminated);
                    }
                };
                let after_quote = &after_open[quote_end + 1..];
                if !after_quote.starts_with(SSI_CLOSE) {
                    conn.should_evict = true;
                    return Err(EvictReason::SsiUnterminated);
                }

                if let Some(handler) = &config.ssi_handler {
                    if handler(conn, &var_name).is_err() {
                        conn.should_evict = true;
                        return Err(EvictReason::WriteFailed);
                    }
                }

                rest = &after_quote[SSI_CLOSE.len()..];
            }
        }
    }
}

fn write_all(conn: &mut Connection, bytes: &[u8]) -> Result<(), EvictReason> {
    match conn.stream.write_all(bytes) {
        Ok(()) => Ok(()),
        Err(_) => {
            conn.should_evict = true;
            Err(EvictReason::SendShort)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mio::net::TcpListener;
    use mio::Token;
    use std::io::Read;
    use std::net::TcpStream as StdTcpStream;
    use std::sync::Arc;

    fn connected_pair(config: Arc<Config>) -> (Connection, StdTcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StdTcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        (
            Connection::new(Token(0), server_side, 4096, config),
            client,
        )
    }

    #[test]
    fn s1_send_response_status_line_and_content_length() {
        let (mut conn, mut client) = connected_pair(Arc::new(Config::new(0)));
        let body = b"<html>Hello there!</html>";
        send_response(
            &mut conn,
            HTTP_OK,
            Some("text/html"),
            body.len(),
            None,
            Some(body),
        )
        .unwrap();

        let mut buf = Vec::new();
        client.set_nonblocking(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let _ = client.read_to_end(&mut buf);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("HTTP/1.1 200\r\n"));
        assert!(text.contains("Content-Length: 25\r\n"));
        assert!(text.ends_with("<html>Hello there!</html>"));
        assert!(text.contains("\r\n\r\n<html>"));
    }

    #[test]
    fn s5_send_data_substitutes_ssi_directive() {
        let config = Arc::new(Config::new(0).with_ssi_handler(Arc::new(|conn, name| {
            assert_eq!(name, "x");
            conn.stream.write_all(b"MID")
        })));
        let (mut conn, mut client) = connected_pair(config);
        let body = b"A<!--#echo var=\"x\" -->B";
        send_data(&mut conn, 0, body).unwrap();

        let mut buf = Vec::new();
        client.set_nonblocking(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let _ = client.read_to_end(&mut buf);
        assert_eq!(buf, b"AMIDB");
    }

    #[test]
    fn send_data_without_directives_is_byte_identical() {
        let (mut conn, mut client) = connected_pair(Arc::new(Config::new(0)));
        let body = b"plain body, no directives here";
        send_data(&mut conn, 0, body).unwrap();

        let mut buf = Vec::new();
        client.set_nonblocking(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let _ = client.read_to_end(&mut buf);
        assert_eq!(&buf[..], &body[..]);
    }

    #[test]
    fn send_data_unterminated_directive_is_fatal() {
        let (mut conn, _client) = connected_pair(Arc::new(Config::new(0)));
        let body = b"A<!--#echo var=\"x";
        let err = send_data(&mut conn, 0, body).unwrap_err();
        assert!(matches!(err, EvictReason::SsiUnterminated));
        assert!(conn.should_evict);
    }
}
