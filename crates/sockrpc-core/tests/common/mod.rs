//! Fake RPC peers for integration tests.
//!
//! Each peer runs on a background thread, captures the request it receives
//! and answers with raw HTTP bytes.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A request as seen by the peer.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Header names exactly as sent, in order.
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Raw HTTP response with a `Content-Length` body.
pub fn http_response(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let mut raw = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(body);
    raw
}

fn read_request<R: BufRead>(reader: &mut R) -> CapturedRequest {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').unwrap();
        headers.push((name.to_string(), value.trim_start().to_string()));
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.parse::<usize>().unwrap())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    CapturedRequest {
        request_line: request_line.trim_end().to_string(),
        headers,
        body,
    }
}

fn handle<S, F>(stream: S, respond: F) -> CapturedRequest
where
    S: Read + Write,
    F: FnOnce(&CapturedRequest) -> Vec<u8>,
{
    let mut reader = BufReader::new(stream);
    let captured = read_request(&mut reader);
    let mut stream = reader.into_inner();
    stream.write_all(&respond(&captured)).unwrap();
    stream.flush().unwrap();
    captured
}

/// Accept one connection on `listener` and answer it with `response`.
#[cfg(unix)]
pub fn serve_unix_once(listener: UnixListener, response: Vec<u8>) -> JoinHandle<CapturedRequest> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handle(stream, |_| response)
    })
}

/// Accept `count` connections, answering each with the output of `respond`.
#[cfg(unix)]
pub fn serve_unix_many(
    listener: UnixListener,
    count: usize,
    respond: fn(&CapturedRequest) -> Vec<u8>,
) -> JoinHandle<Vec<CapturedRequest>> {
    thread::spawn(move || {
        let workers: Vec<_> = (0..count)
            .map(|_| {
                let (stream, _) = listener.accept().unwrap();
                thread::spawn(move || handle(stream, respond))
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    })
}

/// Accept one TCP connection on `listener` and answer it with `response`.
pub fn serve_tcp_once(listener: TcpListener, response: Vec<u8>) -> JoinHandle<CapturedRequest> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handle(stream, |_| response)
    })
}

/// A TLS peer presenting a freshly generated self-signed certificate.
pub struct TlsPeer {
    pub port: u16,
    /// PEM of the certificate the peer presents.
    pub certificate_pem: String,
    /// The request, if the handshake succeeded.
    pub handle: JoinHandle<Option<CapturedRequest>>,
}

/// Serve one TLS connection on 127.0.0.1 with a certificate for `subject`.
pub fn serve_tls_once(subject: &str, response: Vec<u8>) -> TlsPeer {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![subject.to_string()]).unwrap();
    let certificate_pem = cert.pem();
    let identity = native_tls::Identity::from_pkcs8(
        certificate_pem.as_bytes(),
        key_pair.serialize_pem().as_bytes(),
    )
    .unwrap();
    let acceptor = native_tls::TlsAcceptor::new(identity).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let tls = acceptor.accept(stream).ok()?;
        Some(handle(tls, |_| response))
    });

    TlsPeer {
        port,
        certificate_pem,
        handle: server,
    }
}
