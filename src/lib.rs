//! Minimal embedded HTTP/1.1 server core for single-threaded,
//! readiness-based hosts: a byte-buffered incremental request parser,
//! a streaming response writer with inline SSI substitution, and a
//! `mio`-driven reactor tying both to a listening socket.

pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod reactor;
pub mod request;
pub mod response;

pub use config::{Config, GetHandler, GetHandlerEntry, PostHandler, SsiHandler};
pub use connection::Connection;
pub use error::{EvictReason, ProcessError, StartError};
pub use reactor::Server;
pub use response::{
    send_data, send_response, HTTP_ACCEPTED, HTTP_BAD_REQUEST, HTTP_CONTINUE, HTTP_CREATED,
    HTTP_FORBIDDEN, HTTP_FOUND, HTTP_NOT_FOUND, HTTP_OK, HTTP_PERMANENT_REDIRECT,
    HTTP_TEMPORARY_REDIRECT, HTTP_UNAUTHORIZED,
};
