//! Blocking transports that carry one request/response exchange.
//!
//! Each exchange opens a fresh connection, writes the request, reads the full
//! response and drops the connection. Nothing is pooled or retried.
//!
//! The local transport frames HTTP/1.1 itself over the socket; the remote
//! transport hands the request to `reqwest`.

#[cfg(unix)]
pub mod local;
pub mod tcp;

#[cfg(unix)]
pub use local::LocalSocketTransport;
pub use tcp::TcpTransport;

use crate::error::Result;
use crate::http::{RequestEnvelope, ResponseEnvelope};

/// A blocking request/response carrier.
pub trait Transport: Send + Sync {
    /// Send `request` on a new connection and block for the full response.
    fn exchange(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope>;

    /// Value for the `Host` header, for transports that need one.
    fn host(&self) -> Option<&str> {
        None
    }
}
