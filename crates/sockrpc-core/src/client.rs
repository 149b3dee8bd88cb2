//! RPC client: builds, authenticates, sends and interprets one call.
//!
//! A client is bound to one [`Target`]. The target picks both the transport
//! and the authentication scheme:
//!
//! - [`Target::LocalSocket`] stamps the shared secret;
//! - [`Target::Remote`] stamps the forwarded session cookie and a `Host`
//!   header.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use sockrpc::RpcClient;
//!
//! sockrpc::initialize_from_environment()?;
//!
//! let client = RpcClient::local("/run/app/rpc.sock");
//! if let Some(result) = client.invoke("/rpc/list_sessions", &json!({}))? {
//!     println!("{result}");
//! }
//! # Ok::<(), sockrpc::RpcError>(())
//! ```

use crate::auth::{Authenticator, SharedSecret};
use crate::codec;
use crate::config::{AuthConfig, TransportOptions};
use crate::error::{Result, RpcError};
use crate::request::build_request;
use crate::response::interpret;
#[cfg(unix)]
use crate::transport::LocalSocketTransport;
use crate::transport::{TcpTransport, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where calls are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Same-host Unix-domain socket.
    #[cfg(unix)]
    LocalSocket(PathBuf),
    /// Network peer, optionally over TLS.
    Remote {
        address: String,
        port: u16,
        use_tls: bool,
    },
}

/// Blocking JSON-RPC client.
///
/// Cheap to clone and safe to share between threads; every call opens its
/// own connection.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    authenticator: Authenticator,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("host", &self.transport.host())
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

impl RpcClient {
    /// Create a builder for `target`.
    pub fn builder(target: Target) -> RpcClientBuilder {
        RpcClientBuilder::new(target)
    }

    /// Client for a local socket, authenticated with the process-wide secret
    /// as it stands at each call.
    #[cfg(unix)]
    pub fn local(socket_path: impl Into<PathBuf>) -> Self {
        Self::builder(Target::LocalSocket(socket_path.into())).build()
    }

    /// Client for a network peer, authenticated with the session cookie.
    pub fn remote(address: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self::builder(Target::Remote {
            address: address.into(),
            port,
            use_tls,
        })
        .build()
    }

    /// Client over a custom transport.
    pub fn with_transport(
        transport: impl Transport + 'static,
        authenticator: Authenticator,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            authenticator,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Call `endpoint` with `payload`.
    ///
    /// Returns `Ok(None)` when the peer answered 200 with an empty body.
    /// Blocks the calling thread; from async code use `invoke_async`.
    pub fn invoke<P: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &P,
    ) -> Result<Option<Value>> {
        let mut request = build_request(endpoint, payload)?;
        self.authenticator.stamp(&mut request);
        if let Some(host) = self.transport.host() {
            request.set_host(host);
        }
        // Stamped values are checked before anything is sent.
        request.validate()?;

        debug!(endpoint, "Invoking RPC");
        let response = self.transport.exchange(&request)?;
        interpret(endpoint, &response)
    }

    /// Call `endpoint` and decode a present result into `R`.
    ///
    /// A result that does not match `R` is a `Parse` error.
    pub fn call<P, R>(&self, endpoint: &str, payload: &P) -> Result<Option<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let Some(value) = self.invoke(endpoint, payload)? else {
            return Ok(None);
        };

        match codec::decode_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                warn!(endpoint, error = %e, "RPC result has an unexpected shape");
                Err(RpcError::parse(endpoint, e))
            }
        }
    }

    /// Run [`invoke`](Self::invoke) on tokio's blocking pool.
    ///
    /// Dropping the returned future stops waiting for the result; the
    /// exchange itself still runs to completion on its own connection.
    #[cfg(feature = "async")]
    pub async fn invoke_async(
        &self,
        endpoint: impl Into<String>,
        payload: Value,
    ) -> Result<Option<Value>> {
        let client = self.clone();
        let endpoint = endpoint.into();
        match tokio::task::spawn_blocking(move || client.invoke(&endpoint, &payload)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RpcError::protocol("RPC task was cancelled")),
        }
    }
}

/// Builder for [`RpcClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sockrpc::{RpcClient, Target};
///
/// let client = RpcClient::builder(Target::Remote {
///     address: "rpc.example.com".into(),
///     port: 8443,
///     use_tls: true,
/// })
/// .connect_timeout(Duration::from_secs(5))
/// .build();
/// ```
#[derive(Debug, Clone)]
pub struct RpcClientBuilder {
    target: Target,
    secret: Option<SharedSecret>,
    cookie_env_var: String,
    options: TransportOptions,
}

impl RpcClientBuilder {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            secret: None,
            cookie_env_var: AuthConfig::COOKIE_ENV_VAR.to_string(),
            options: TransportOptions::default(),
        }
    }

    /// Secret for local calls.
    ///
    /// Default: the process-wide secret, read on every call.
    pub fn secret(mut self, secret: SharedSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Environment variable the session cookie is read from on remote calls.
    ///
    /// Default: `RS_SESSION_RPC_COOKIE`
    pub fn cookie_env_var(mut self, name: impl Into<String>) -> Self {
        self.cookie_env_var = name.into();
        self
    }

    /// Default: none (block until the OS gives up).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Default: none.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.options.io_timeout = Some(timeout);
        self
    }

    /// Default: 64MB
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.options.max_response_size = bytes;
        self
    }

    /// Trust an extra PEM-encoded root certificate for TLS.
    pub fn root_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.options.root_certificates.push(pem.into());
        self
    }

    pub fn build(self) -> RpcClient {
        match self.target {
            #[cfg(unix)]
            Target::LocalSocket(path) => {
                let authenticator = match self.secret {
                    Some(secret) => Authenticator::SharedSecret(secret),
                    None => Authenticator::ProcessSecret,
                };
                RpcClient::with_transport(
                    LocalSocketTransport::new(path, self.options),
                    authenticator,
                )
            }
            Target::Remote {
                address,
                port,
                use_tls,
            } => RpcClient::with_transport(
                TcpTransport::new(address, port, use_tls, self.options),
                Authenticator::ForwardedCookie {
                    env_var: self.cookie_env_var,
                },
            ),
        }
    }
}

/// Call `endpoint` over the local socket at `socket_path`, authenticated with
/// the process-wide secret.
#[cfg(unix)]
pub fn invoke_local<P: Serialize + ?Sized>(
    socket_path: &Path,
    endpoint: &str,
    payload: &P,
) -> Result<Option<Value>> {
    RpcClient::local(socket_path).invoke(endpoint, payload)
}

/// Call `endpoint` on `address:port`, authenticated with the session cookie.
pub fn invoke_remote<P: Serialize + ?Sized>(
    address: &str,
    port: u16,
    use_tls: bool,
    endpoint: &str,
    payload: &P,
) -> Result<Option<Value>> {
    RpcClient::remote(address, port, use_tls).invoke(endpoint, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcErrorKind;
    use crate::http::{RequestEnvelope, ResponseEnvelope};
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport that records requests and replays a canned response.
    struct CannedTransport {
        host: Option<String>,
        response: ResponseEnvelope,
        seen: Arc<Mutex<Vec<RequestEnvelope>>>,
    }

    impl CannedTransport {
        fn new(response: ResponseEnvelope) -> (Self, Arc<Mutex<Vec<RequestEnvelope>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                host: None,
                response,
                seen: seen.clone(),
            };
            (transport, seen)
        }
    }

    impl Transport for CannedTransport {
        fn exchange(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }

        fn host(&self) -> Option<&str> {
            self.host.as_deref()
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn exchange(&self, _request: &RequestEnvelope) -> Result<ResponseEnvelope> {
            Err(RpcError::transport(
                "refused",
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            ))
        }
    }

    #[test]
    fn test_invoke_stamps_secret_and_decodes() {
        let (transport, seen) =
            CannedTransport::new(ResponseEnvelope::new(200, "OK", br#"{"ok":true}"#.to_vec()));
        let client = RpcClient::with_transport(
            transport,
            Authenticator::SharedSecret(SharedSecret::new("xyz")),
        );

        let result = client.invoke("/rpc/status", &json!({"verbose": false})).unwrap();
        assert_eq!(result, Some(json!({"ok": true})));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri(), "/rpc/status");
        assert_eq!(request.header("Connection"), Some("close"));
        assert_eq!(request.header("X-RS-RPC-Secret"), Some("xyz"));
        assert_eq!(request.header("Host"), None);
        assert_eq!(request.body(), br#"{"verbose":false}"#);
    }

    #[test]
    fn test_invoke_sets_host_when_transport_has_one() {
        let (mut transport, seen) = CannedTransport::new(ResponseEnvelope::new(200, "OK", ""));
        transport.host = Some("rpc.internal".to_string());
        let client = RpcClient::with_transport(transport, Authenticator::forwarded_cookie());

        assert_eq!(client.invoke("/rpc/x", &json!({})).unwrap(), None);
        assert_eq!(seen.lock().unwrap()[0].header("host"), Some("rpc.internal"));
    }

    #[test]
    fn test_transport_error_is_returned_untouched() {
        let client = RpcClient::with_transport(FailingTransport, Authenticator::forwarded_cookie());
        let err = client.invoke("/rpc/x", &json!({})).unwrap_err();
        assert_eq!(err.kind(), RpcErrorKind::Transport);
    }

    #[test]
    fn test_call_decodes_typed_result() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Status {
            ok: bool,
        }

        let (transport, _) =
            CannedTransport::new(ResponseEnvelope::new(200, "OK", br#"{"ok":true}"#.to_vec()));
        let client = RpcClient::with_transport(transport, Authenticator::forwarded_cookie());

        let status: Option<Status> = client.call("/rpc/status", &json!({})).unwrap();
        assert_eq!(status, Some(Status { ok: true }));
    }

    #[test]
    fn test_call_shape_mismatch_is_parse_error() {
        let (transport, _) =
            CannedTransport::new(ResponseEnvelope::new(200, "OK", b"[1,2,3]".to_vec()));
        let client = RpcClient::with_transport(transport, Authenticator::forwarded_cookie());

        let err = client
            .call::<_, std::collections::HashMap<String, u32>>("/rpc/x", &json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), RpcErrorKind::Parse);
    }

    #[test]
    fn test_call_empty_body_is_none() {
        let (transport, _) = CannedTransport::new(ResponseEnvelope::new(200, "OK", ""));
        let client = RpcClient::with_transport(transport, Authenticator::forwarded_cookie());

        let result: Option<u32> = client.call("/rpc/x", &json!({})).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_builder_picks_authenticator_by_target() {
        let remote = RpcClient::builder(Target::Remote {
            address: "example.com".into(),
            port: 443,
            use_tls: true,
        })
        .cookie_env_var("MY_COOKIE")
        .build();
        assert_eq!(
            remote.authenticator(),
            &Authenticator::ForwardedCookie {
                env_var: "MY_COOKIE".to_string()
            }
        );

        #[cfg(unix)]
        {
            let local = RpcClient::builder(Target::LocalSocket("/tmp/x.sock".into()))
                .secret(SharedSecret::new("abc"))
                .build();
            assert_eq!(
                local.authenticator(),
                &Authenticator::SharedSecret(SharedSecret::new("abc"))
            );

            let default = RpcClient::local("/tmp/x.sock");
            assert_eq!(default.authenticator(), &Authenticator::ProcessSecret);
        }
    }

    #[test]
    fn test_bad_endpoint_never_reaches_transport() {
        for endpoint in ["", "/a b", "/rpc/x\r\nEvil: 1"] {
            let (transport, seen) = CannedTransport::new(ResponseEnvelope::new(200, "OK", ""));
            let client = RpcClient::with_transport(transport, Authenticator::forwarded_cookie());

            let err = client.invoke(endpoint, &json!({})).unwrap_err();
            assert_eq!(err.kind(), RpcErrorKind::InvalidRequest, "{endpoint:?}");
            assert!(seen.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_unsendable_credential_never_reaches_transport() {
        let (transport, seen) = CannedTransport::new(ResponseEnvelope::new(200, "OK", ""));
        let client = RpcClient::with_transport(
            transport,
            Authenticator::SharedSecret(SharedSecret::new("abc\r\nX-Evil: 1")),
        );

        let err = client.invoke("/rpc/x", &json!({})).unwrap_err();
        assert_eq!(err.kind(), RpcErrorKind::InvalidRequest);
        assert!(!err.to_string().contains("X-Evil"));
        assert!(seen.lock().unwrap().is_empty());
    }
}
