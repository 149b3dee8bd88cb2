//! Blocking-pool wrapper tests (`async` feature).

#![cfg(all(feature = "async", unix))]

mod common;

use common::{http_response, serve_unix_once};
use serde_json::json;
use sockrpc::{RpcClient, RpcErrorKind, SharedSecret, Target};
use std::os::unix::net::UnixListener;
use std::time::Duration;
use tempfile::TempDir;

fn client(path: &std::path::Path) -> RpcClient {
    RpcClient::builder(Target::LocalSocket(path.to_path_buf()))
        .secret(SharedSecret::new("async-secret"))
        .build()
}

#[tokio::test]
async fn test_invoke_async_returns_result() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rpc.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let server = serve_unix_once(listener, http_response(200, "OK", br#"{"ok":true}"#));

    let result = client(&path)
        .invoke_async("/rpc/status", json!({}))
        .await
        .unwrap();
    assert_eq!(result, Some(json!({"ok": true})));

    let request = server.join().unwrap();
    assert_eq!(request.header("X-RS-RPC-Secret"), Some("async-secret"));
}

#[tokio::test]
async fn test_invoke_async_surfaces_errors() {
    let dir = TempDir::new().unwrap();
    let err = client(&dir.path().join("absent.sock"))
        .invoke_async("/rpc/status", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RpcErrorKind::Transport);
}

#[tokio::test]
async fn test_caller_deadline_abandons_slow_call() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rpc.sock");
    let listener = UnixListener::bind(&path).unwrap();

    // Peer accepts but never answers until the test is done.
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_millis(500));
        drop(stream);
    });

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        client(&path).invoke_async("/rpc/slow", json!({})),
    )
    .await;
    assert!(outcome.is_err(), "deadline should elapse first");

    server.join().unwrap();
}
