//! Server configuration: recognized options, defaults, and the single
//! validation pass performed once at [`crate::Server::start`].

use std::sync::Arc;

use crate::connection::Connection;
use crate::error::StartError;

pub const DEFAULT_PROCESS_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_RX_BUFFER_SIZE: usize = 4096;

/// `(conn, target, query_params, source_address)`.
pub type GetHandler = Arc<dyn Fn(&mut Connection, &str, &[&str], &str) + Send + Sync>;

/// `(conn, uri, filename, source_address, start, finish, data, total_length)`.
pub type PostHandler =
    Arc<dyn Fn(&mut Connection, &str, Option<&str>, &str, bool, bool, &[u8], usize) + Send + Sync>;

/// `(conn, variable_name) -> written directly to the socket`.
pub type SsiHandler = Arc<dyn Fn(&mut Connection, &str) -> std::io::Result<()> + Send + Sync>;

/// One entry in the ordered GET-handler table: invoked when `uri` is a
/// byte-prefix of the request target. Every matching entry is invoked,
/// not just the first (see `DESIGN.md`'s open-question decisions).
#[derive(Clone)]
pub struct GetHandlerEntry {
    pub uri: String,
    pub handler: GetHandler,
}

impl GetHandlerEntry {
    pub fn new(uri: impl Into<String>, handler: GetHandler) -> Self {
        Self {
            uri: uri.into(),
            handler,
        }
    }
}

/// Process-wide configuration, evaluated once at `start`.
#[derive(Clone, Default)]
pub struct Config {
    pub server_port: u16,
    pub process_timeout_ms: u64,
    pub rx_buffer_size: usize,
    pub get_handlers: Vec<GetHandlerEntry>,
    pub default_get_handler: Option<GetHandler>,
    pub post_handler: Option<PostHandler>,
    pub ssi_handler: Option<SsiHandler>,
}

impl Config {
    pub fn new(server_port: u16) -> Self {
        Self {
            server_port,
            process_timeout_ms: DEFAULT_PROCESS_TIMEOUT_MS,
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            get_handlers: Vec::new(),
            default_get_handler: None,
            post_handler: None,
            ssi_handler: None,
        }
    }

    pub fn with_rx_buffer_size(mut self, size: usize) -> Self {
        self.rx_buffer_size = size;
        self
    }

    pub fn with_process_timeout_ms(mut self, ms: u64) -> Self {
        self.process_timeout_ms = ms;
        self
    }

    pub fn with_get_handler(mut self, uri: impl Into<String>, handler: GetHandler) -> Self {
        self.get_handlers.push(GetHandlerEntry::new(uri, handler));
        self
    }

    pub fn with_default_get_handler(mut self, handler: GetHandler) -> Self {
        self.default_get_handler = Some(handler);
        self
    }

    pub fn with_post_handler(mut self, handler: PostHandler) -> Self {
        self.post_handler = Some(handler);
        self
    }

    pub fn with_ssi_handler(mut self, handler: SsiHandler) -> Self {
        self.ssi_handler = Some(handler);
        self
    }

    pub fn validate(&self) -> Result<(), StartError> {
        if self.rx_buffer_size == 0 {
            return Err(StartError::InvalidConfig("rx_buffer_size must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation() {
        let config = Config::new(0).with_rx_buffer_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn configured_buffer_size_passes() {
        let config = Config::new(8080).with_rx_buffer_size(1024);
        assert!(config.validate().is_ok());
    }
}
