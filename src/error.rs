//! Manual error enums for start-time failure and per-connection eviction,
//! written out by hand rather than derived, matching the request
//! parser's own `ParseError` in this workspace.

use std::fmt;

/// Fatal failure returned from [`crate::Server::start`].
#[derive(Debug)]
pub enum StartError {
    InvalidConfig(&'static str),
    Bind(std::io::Error),
    Listen(std::io::Error),
    Register(std::io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            StartError::Bind(e) => write!(f, "failed to bind listening socket: {e}"),
            StartError::Listen(e) => write!(f, "failed to listen on socket: {e}"),
            StartError::Register(e) => write!(f, "failed to register listener with poller: {e}"),
        }
    }
}

impl std::error::Error for StartError {}

/// Fatal failure returned from [`crate::Server::process`] (the
/// readiness-wait step itself failing; everything else is an internal
/// eviction that never surfaces here).
#[derive(Debug)]
pub enum ProcessError {
    NotRunning,
    Poll(std::io::Error),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::NotRunning => write!(f, "server is not running"),
            ProcessError::Poll(e) => write!(f, "readiness wait failed: {e}"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Reason a connection was dropped. Never propagated past the reactor;
/// it only drives logging before the connection record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    BufferOverrun,
    Underrun,
    ReadFailed,
    ReadClosed,
    ParseFatal,
    SendShort,
    SsiUnterminated,
    WriteFailed,
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictReason::BufferOverrun => write!(f, "receive buffer full before a delimiter was found"),
            EvictReason::Underrun => write!(f, "state machine reported consumed > rx_size"),
            EvictReason::ReadFailed => write!(f, "socket read failed"),
            EvictReason::ReadClosed => write!(f, "peer closed the connection"),
            EvictReason::ParseFatal => write!(f, "fatal parse error"),
            EvictReason::SendShort => write!(f, "send wrote fewer bytes than requested"),
            EvictReason::SsiUnterminated => write!(f, "unterminated SSI directive"),
            EvictReason::WriteFailed => write!(f, "socket write failed"),
        }
    }
}

impl std::error::Error for EvictReason {}
