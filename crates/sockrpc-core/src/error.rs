//! Error types for sockrpc.
//!
//! Every failure of an RPC call is returned to the caller as an [`RpcError`].
//! Each variant records the source location that raised it so upstream logs
//! can point at the exact call site without a backtrace.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Source location (file and line) an error was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    file: &'static str,
    line: u32,
}

impl ErrorLocation {
    /// Capture the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Main error type for sockrpc.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connect, send, receive or TLS failure, or a malformed HTTP response.
    #[error("Transport error: {message} (at {location})")]
    Transport {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The peer answered with a non-success status.
    #[error("RPC {endpoint} failed: {status} {status_message} (at {location})")]
    Execution {
        endpoint: String,
        status: u16,
        status_message: String,
        location: ErrorLocation,
    },

    /// The peer answered 200 with a body that is not the expected JSON.
    #[error("Unparseable result from RPC {endpoint}: {message} (at {location})")]
    Parse {
        endpoint: String,
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The endpoint or a header value cannot be put on the wire.
    #[error("Invalid RPC request: {message} (at {location})")]
    InvalidRequest {
        message: String,
        location: ErrorLocation,
    },

    /// The payload could not be serialized.
    #[error("Failed to encode RPC payload: {message} (at {location})")]
    Encode {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The process-wide RPC secret was already set.
    #[error("RPC secret is already initialized (at {location})")]
    AlreadyInitialized { location: ErrorLocation },
}

/// Result type alias for sockrpc operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Coarse classification of an [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    Transport,
    Execution,
    Parse,
    InvalidRequest,
    Encode,
    AlreadyInitialized,
}

impl From<std::io::Error> for RpcError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        RpcError::Transport {
            message: err.to_string(),
            location: ErrorLocation::caller(),
            source: Some(err),
        }
    }
}

impl RpcError {
    /// Transport failure with an underlying I/O cause.
    #[track_caller]
    pub fn transport(message: impl Into<String>, source: std::io::Error) -> Self {
        RpcError::Transport {
            message: message.into(),
            location: ErrorLocation::caller(),
            source: Some(source),
        }
    }

    /// Transport failure detected by this crate (e.g. a malformed status line).
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        RpcError::Transport {
            message: message.into(),
            location: ErrorLocation::caller(),
            source: None,
        }
    }

    #[track_caller]
    pub fn execution(
        endpoint: impl Into<String>,
        status: u16,
        status_message: impl Into<String>,
    ) -> Self {
        RpcError::Execution {
            endpoint: endpoint.into(),
            status,
            status_message: status_message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn parse(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        RpcError::Parse {
            endpoint: endpoint.into(),
            message: source.to_string(),
            location: ErrorLocation::caller(),
            source: Some(source),
        }
    }

    #[track_caller]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        RpcError::InvalidRequest {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn encode(source: serde_json::Error) -> Self {
        RpcError::Encode {
            message: source.to_string(),
            location: ErrorLocation::caller(),
            source: Some(source),
        }
    }

    #[track_caller]
    pub fn already_initialized() -> Self {
        RpcError::AlreadyInitialized {
            location: ErrorLocation::caller(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::Transport { .. } => RpcErrorKind::Transport,
            RpcError::Execution { .. } => RpcErrorKind::Execution,
            RpcError::Parse { .. } => RpcErrorKind::Parse,
            RpcError::InvalidRequest { .. } => RpcErrorKind::InvalidRequest,
            RpcError::Encode { .. } => RpcErrorKind::Encode,
            RpcError::AlreadyInitialized { .. } => RpcErrorKind::AlreadyInitialized,
        }
    }

    /// Where the error was raised.
    pub fn location(&self) -> ErrorLocation {
        match self {
            RpcError::Transport { location, .. }
            | RpcError::Execution { location, .. }
            | RpcError::Parse { location, .. }
            | RpcError::InvalidRequest { location, .. }
            | RpcError::Encode { location, .. }
            | RpcError::AlreadyInitialized { location } => *location,
        }
    }

    /// HTTP status reported by the peer, for `Execution` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            RpcError::Execution { status, .. } => Some(*status),
            _ => None,
        }
    }
}
