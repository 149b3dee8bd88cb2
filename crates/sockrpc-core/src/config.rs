//! Centralized configuration for sockrpc.
//!
//! Protocol constants are part of the wire contract with the peer server and
//! must not change. Transport limits are defaults for [`TransportOptions`].

use std::time::Duration;

/// Wire protocol constants shared by every call.
pub struct ProtocolConfig;

impl ProtocolConfig {
    pub const METHOD: &'static str = "POST";
    pub const HTTP_VERSION: &'static str = "HTTP/1.1";
    pub const SUCCESS_STATUS: u16 = 200;
    pub const CONNECTION_HEADER: &'static str = "Connection";
    pub const CONNECTION_CLOSE: &'static str = "close";
    pub const HOST_HEADER: &'static str = "Host";
    pub const CONTENT_LENGTH_HEADER: &'static str = "Content-Length";
}

/// Authentication header and environment variable names.
pub struct AuthConfig;

impl AuthConfig {
    /// Header carrying the process-wide shared secret on local calls.
    pub const SECRET_HEADER: &'static str = "X-RS-RPC-Secret";
    /// Header carrying the forwarded session cookie on remote calls.
    pub const COOKIE_HEADER: &'static str = "X-RS-RPC-Cookie";
    /// Environment variable the shared secret is read from (and then removed).
    pub const SECRET_ENV_VAR: &'static str = "RS_SERVER_RPC_SECRET";
    /// Default environment variable the session cookie is read from per call.
    pub const COOKIE_ENV_VAR: &'static str = "RS_SESSION_RPC_COOKIE";
}

/// Transport defaults.
pub struct TransportConfig;

impl TransportConfig {
    // 64MB
    pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;
    // 64KB
    pub const MAX_HEAD_SIZE: usize = 64 * 1024;
    pub const MAX_HEADER_COUNT: usize = 128;
}

/// Per-client transport settings.
///
/// `None` timeouts block indefinitely, which is the default. On remote calls
/// `io_timeout` bounds the whole exchange. This layer never retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Timeout for establishing a TCP connection (ignored for Unix sockets).
    pub connect_timeout: Option<Duration>,
    /// Read/write timeout applied to the connected socket.
    pub io_timeout: Option<Duration>,
    /// Largest response body accepted before the call fails.
    pub max_response_size: usize,
    /// Extra PEM-encoded roots trusted for TLS, on top of the system store.
    pub root_certificates: Vec<Vec<u8>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            io_timeout: None,
            max_response_size: TransportConfig::MAX_RESPONSE_SIZE,
            root_certificates: Vec::new(),
        }
    }
}
