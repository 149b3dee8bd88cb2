//! sockrpc - blocking, authenticated JSON-RPC calls between trusted processes.
//!
//! A call is a single `POST` of a JSON payload to an endpoint path, over a
//! fresh connection that is closed once the response is read. Two transports
//! are supported:
//!
//! - **Local**: a Unix-domain socket. Requests carry the process-wide shared
//!   secret in `X-RS-RPC-Secret`.
//! - **Remote**: TCP, optionally TLS with hostname verification. Requests
//!   carry the session cookie (read from the environment on every call) in
//!   `X-RS-RPC-Cookie`, plus a `Host` header.
//!
//! A 200 response with an empty body yields `Ok(None)`; a JSON body yields
//! `Ok(Some(value))`. Everything else is an [`RpcError`]. Nothing is retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//!
//! fn main() -> sockrpc::Result<()> {
//!     // Once, at startup, before any worker threads exist.
//!     sockrpc::initialize_from_environment()?;
//!
//!     let result = sockrpc::invoke_local(
//!         std::path::Path::new("/run/app/rpc.sock"),
//!         "/rpc/get_status",
//!         &json!({}),
//!     )?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;

pub use auth::{
    current_secret, initialize_from_environment, initialize_with_secret, Authenticator,
    SharedSecret,
};
#[cfg(unix)]
pub use client::invoke_local;
pub use client::{invoke_remote, RpcClient, RpcClientBuilder, Target};
pub use config::TransportOptions;
pub use error::{ErrorLocation, Result, RpcError, RpcErrorKind};
pub use http::{RequestEnvelope, ResponseEnvelope};
pub use transport::Transport;
