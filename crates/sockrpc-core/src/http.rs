//! HTTP/1.1 request and response envelopes.
//!
//! Requests always carry a `Content-Length` body. Response heads are parsed
//! with `httparse`; bodies may be delimited by `Content-Length`, chunked
//! encoding, or the peer closing the connection.

use crate::config::{ProtocolConfig, TransportConfig};
use crate::error::{Result, RpcError};
use std::io::{self, Read, Write};

const READ_CHUNK: usize = 8 * 1024;

/// A request ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RequestEnvelope {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Set a header, replacing any existing header with the same name.
    ///
    /// Names are compared case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Set the `Host` header.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.set_header(ProtocolConfig::HOST_HEADER, host);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Check that the method, URI and headers can be put on the wire as-is.
    ///
    /// Rejects an empty URI or one containing whitespace or control bytes,
    /// and header values containing CR, LF or NUL.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(RpcError::invalid_request)
    }

    fn check(&self) -> std::result::Result<(), String> {
        check_token("method", &self.method)?;
        let bad_uri_byte = |b: u8| b.is_ascii_whitespace() || b.is_ascii_control();
        if self.uri.is_empty() || self.uri.bytes().any(bad_uri_byte) {
            return Err(format!("invalid endpoint: {:?}", self.uri));
        }
        for (name, value) in &self.headers {
            check_token("header name", name)?;
            if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
                return Err(format!("header {name} contains a line break or NUL"));
            }
        }
        Ok(())
    }

    /// Serialize the request onto `writer`.
    ///
    /// Nothing is written if the request does not pass [`validate`](Self::validate).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.check()
            .map_err(|message| io::Error::new(io::ErrorKind::InvalidInput, message))?;

        let mut head = format!(
            "{} {} {}\r\n",
            self.method,
            self.uri,
            ProtocolConfig::HTTP_VERSION
        );
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(ProtocolConfig::CONTENT_LENGTH_HEADER) {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!(
            "{}: {}\r\n\r\n",
            ProtocolConfig::CONTENT_LENGTH_HEADER,
            self.body.len()
        ));

        writer.write_all(head.as_bytes())?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

/// A response read back from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    status_code: u16,
    status_message: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseEnvelope {
    pub fn new(
        status_code: u16,
        status_message: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Attach a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as text, lossily decoded, for diagnostics.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Read a complete response from `reader`.
    ///
    /// Interim `1xx` responses are skipped. Bodies larger than `max_body`
    /// bytes are rejected.
    pub fn read_from<R: Read>(reader: &mut R, max_body: usize) -> Result<Self> {
        let mut buf = Vec::new();
        loop {
            let head = read_head(reader, &mut buf)?;
            if (100..200).contains(&head.status_code) {
                continue;
            }

            let body = if head.status_code == 204 || head.status_code == 304 {
                Vec::new()
            } else {
                read_body(reader, &mut buf, &head.headers, max_body)?
            };

            return Ok(Self {
                status_code: head.status_code,
                status_message: head.status_message,
                headers: head.headers,
                body,
            });
        }
    }
}

struct Head {
    status_code: u16,
    status_message: String,
    headers: Vec<(String, String)>,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn check_token(what: &str, token: &str) -> std::result::Result<(), String> {
    let valid = !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if valid {
        Ok(())
    } else {
        Err(format!("invalid {what}: {token:?}"))
    }
}

/// Append whatever `reader` has next to `buf`. Returns 0 on EOF.
fn fill<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                return Ok(n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let message = format!("failed to read response: {e}");
                return Err(RpcError::transport(message, e));
            }
        }
    }
}

fn fill_to<R: Read>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    len: usize,
    eof_message: &str,
) -> Result<()> {
    while buf.len() < len {
        if fill(reader, buf)? == 0 {
            return Err(RpcError::protocol(eof_message));
        }
    }
    Ok(())
}

fn parse_head(buf: &[u8]) -> Result<Option<(Head, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; TransportConfig::MAX_HEADER_COUNT];
    let mut response = httparse::Response::new(&mut headers);
    let len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            return Err(RpcError::protocol("too many response headers"))
        }
        Err(e) => return Err(RpcError::protocol(format!("malformed response head: {e}"))),
    };

    let status_code = response
        .code
        .ok_or_else(|| RpcError::protocol("response has no status code"))?;
    let head = Head {
        status_code,
        status_message: response.reason.unwrap_or_default().trim().to_string(),
        headers: response
            .headers
            .iter()
            .map(|h| {
                let value = String::from_utf8_lossy(h.value).trim().to_string();
                (h.name.to_string(), value)
            })
            .collect(),
    };
    Ok(Some((head, len)))
}

/// Read one response head, leaving any bytes after it in `buf`.
fn read_head<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Head> {
    loop {
        if let Some((head, len)) = parse_head(buf)? {
            buf.drain(..len);
            return Ok(head);
        }
        if buf.len() > TransportConfig::MAX_HEAD_SIZE {
            return Err(RpcError::protocol("response head too large"));
        }
        if fill(reader, buf)? == 0 {
            return Err(RpcError::protocol(if buf.is_empty() {
                "connection closed before a response was received"
            } else {
                "connection closed inside response headers"
            }));
        }
    }
}

fn read_body<R: Read>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    headers: &[(String, String)],
    max_body: usize,
) -> Result<Vec<u8>> {
    let chunked = find_header(headers, "Transfer-Encoding")
        .map(|te| te.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);
    if chunked {
        return read_chunked_body(reader, buf, max_body);
    }

    if let Some(length) = find_header(headers, ProtocolConfig::CONTENT_LENGTH_HEADER) {
        let length: usize = length
            .parse()
            .map_err(|_| RpcError::protocol(format!("invalid Content-Length: {length:?}")))?;
        if length > max_body {
            return Err(too_large(max_body));
        }
        fill_to(
            reader,
            buf,
            length,
            "connection closed before the full response body was received",
        )?;
        buf.truncate(length);
        return Ok(std::mem::take(buf));
    }

    // No framing: the body runs until the peer closes the connection.
    loop {
        if buf.len() > max_body {
            return Err(too_large(max_body));
        }
        if fill(reader, buf)? == 0 {
            return Ok(std::mem::take(buf));
        }
    }
}

fn read_chunked_body<R: Read>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_body: usize,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let (consumed, size) = loop {
            match httparse::parse_chunk_size(buf.as_slice()) {
                Ok(httparse::Status::Complete(parsed)) => break parsed,
                Ok(httparse::Status::Partial) => {
                    if buf.len() > TransportConfig::MAX_HEAD_SIZE {
                        return Err(RpcError::protocol("chunk size line too long"));
                    }
                    if fill(reader, buf)? == 0 {
                        return Err(RpcError::protocol("connection closed inside chunked body"));
                    }
                }
                Err(_) => return Err(RpcError::protocol("invalid chunk size")),
            }
        };
        buf.drain(..consumed);

        // Trailers are left unread; the connection is closed after this response.
        if size == 0 {
            return Ok(body);
        }

        let size = usize::try_from(size)
            .ok()
            .filter(|size| body.len().saturating_add(*size) <= max_body)
            .ok_or_else(|| too_large(max_body))?;
        fill_to(reader, buf, size + 2, "connection closed inside chunked body")?;
        if &buf[size..size + 2] != b"\r\n" {
            return Err(RpcError::protocol("chunk is not terminated by CRLF"));
        }
        body.extend_from_slice(&buf[..size]);
        buf.drain(..size + 2);
    }
}

fn too_large(max_body: usize) -> RpcError {
    RpcError::protocol(format!("response body exceeds maximum of {max_body} bytes"))
}
