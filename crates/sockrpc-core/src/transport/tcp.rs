//! TCP transport, optionally secured with TLS, driven by `reqwest`.
//!
//! With TLS the peer certificate must chain to a trusted root and match the
//! target address. Verification happens during the handshake, so a peer that
//! fails it never receives any part of the request.
//!
//! A fresh `reqwest` client is built per exchange with pooling, proxies and
//! redirects disabled, so every call gets its own connection.

use super::Transport;
use crate::config::{ProtocolConfig, TransportOptions};
use crate::error::{Result, RpcError};
use crate::http::{RequestEnvelope, ResponseEnvelope};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Certificate, Method};
use std::io::{self, Read};
use tracing::debug;

/// Network transport to `address:port`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    port: u16,
    use_tls: bool,
    options: TransportOptions,
}

impl TcpTransport {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        use_tls: bool,
        options: TransportOptions,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            use_tls,
            options,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn uses_tls(&self) -> bool {
        self.use_tls
    }

    /// URL of `endpoint` on this peer.
    pub fn url(&self, endpoint: &str) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        let host = if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]", self.address)
        } else {
            self.address.clone()
        };
        format!("{scheme}://{host}:{}{endpoint}", self.port)
    }

    fn client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .redirect(redirect::Policy::none())
            .http1_only()
            .http1_title_case_headers()
            .timeout(self.options.io_timeout);
        if let Some(timeout) = self.options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        for pem in &self.options.root_certificates {
            let certificate = Certificate::from_pem(pem)
                .map_err(|e| reqwest_error("invalid root certificate", e))?;
            builder = builder.add_root_certificate(certificate);
        }

        builder
            .build()
            .map_err(|e| reqwest_error("failed to create HTTP client", e))
    }
}

fn reqwest_error(context: &str, err: reqwest::Error) -> RpcError {
    RpcError::transport(format!("{context}: {err}"), io::Error::other(err))
}

fn header_map(request: &RequestEnvelope) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in request.headers() {
        if name.eq_ignore_ascii_case(ProtocolConfig::CONTENT_LENGTH_HEADER) {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RpcError::invalid_request(format!("invalid header name: {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| RpcError::invalid_request(format!("header {name} has an invalid value")))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

impl Transport for TcpTransport {
    fn exchange(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope> {
        let method = Method::from_bytes(request.method().as_bytes()).map_err(|_| {
            RpcError::invalid_request(format!("invalid method: {:?}", request.method()))
        })?;
        let headers = header_map(request)?;
        let client = self.client()?;

        debug!(
            "Sending {} {} to {}:{} (tls: {})",
            request.method(),
            request.uri(),
            self.address,
            self.port,
            self.use_tls
        );
        let mut response = client
            .request(method, self.url(request.uri()))
            .headers(headers)
            .body(request.body().to_vec())
            .send()
            .map_err(|e| {
                if e.is_builder() {
                    RpcError::invalid_request(format!("cannot build request: {e}"))
                } else {
                    let context = format!("request to {}:{} failed", self.address, self.port);
                    reqwest_error(&context, e)
                }
            })?;

        let max_body = self.options.max_response_size;
        if response.content_length().is_some_and(|len| len > max_body as u64) {
            return Err(too_large(max_body));
        }

        let status = response.status();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_string(), value)
            })
            .collect();

        let mut body = Vec::new();
        response
            .by_ref()
            .take(max_body as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| {
                let message = format!("failed to read response: {e}");
                RpcError::transport(message, e)
            })?;
        if body.len() > max_body {
            return Err(too_large(max_body));
        }

        let envelope = ResponseEnvelope::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
        );
        Ok(response_headers
            .into_iter()
            .fold(envelope, |envelope, (name, value)| envelope.with_header(name, value)))
    }

    fn host(&self) -> Option<&str> {
        Some(&self.address)
    }
}

fn too_large(max_body: usize) -> RpcError {
    RpcError::protocol(format!("response body exceeds maximum of {max_body} bytes"))
}
