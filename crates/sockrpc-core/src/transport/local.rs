//! Unix-domain socket transport.

use super::Transport;
use crate::config::TransportOptions;
use crate::error::{Result, RpcError};
use crate::http::{RequestEnvelope, ResponseEnvelope};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Same-host transport over a filesystem socket.
#[derive(Debug, Clone)]
pub struct LocalSocketTransport {
    socket_path: PathBuf,
    options: TransportOptions,
}

impl LocalSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, options: TransportOptions) -> Self {
        Self {
            socket_path: socket_path.into(),
            options,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Transport for LocalSocketTransport {
    fn exchange(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope> {
        let stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            RpcError::transport(
                format!("failed to connect to {}", self.socket_path.display()),
                e,
            )
        })?;
        stream.set_read_timeout(self.options.io_timeout)?;
        stream.set_write_timeout(self.options.io_timeout)?;

        debug!(
            "Sending {} {} over {}",
            request.method(),
            request.uri(),
            self.socket_path.display()
        );
        exchange_over(stream, request, &self.options)
    }
}

/// Write `request` to an established stream and read the response.
fn exchange_over<S: Read + Write>(
    mut stream: S,
    request: &RequestEnvelope,
    options: &TransportOptions,
) -> Result<ResponseEnvelope> {
    request.write_to(&mut stream).map_err(|e| {
        let message = format!("failed to send request: {e}");
        RpcError::transport(message, e)
    })?;

    ResponseEnvelope::read_from(&mut stream, options.max_response_size)
}
