//! Process-wide secret lifecycle.
//!
//! The secret can be set once per process, so this binary holds a single
//! sequential test.

mod common;

use sockrpc::{current_secret, initialize_from_environment, initialize_with_secret, RpcErrorKind};

const SECRET_ENV_VAR: &str = "RS_SERVER_RPC_SECRET";

#[test]
fn test_secret_lifecycle() {
    assert_eq!(current_secret(), "");

    std::env::set_var(SECRET_ENV_VAR, "from-parent-process");
    initialize_from_environment().unwrap();

    assert_eq!(current_secret(), "from-parent-process");
    assert!(
        std::env::var_os(SECRET_ENV_VAR).is_none(),
        "secret must be scrubbed from the environment"
    );

    // Re-initialization is rejected and the secret is unchanged.
    let err = initialize_with_secret("attacker").unwrap_err();
    assert_eq!(err.kind(), RpcErrorKind::AlreadyInitialized);
    std::env::set_var(SECRET_ENV_VAR, "second-value");
    let err = initialize_from_environment().unwrap_err();
    assert_eq!(err.kind(), RpcErrorKind::AlreadyInitialized);
    assert_eq!(current_secret(), "from-parent-process");
    std::env::remove_var(SECRET_ENV_VAR);

    #[cfg(unix)]
    {
        use crate::common::{http_response, serve_unix_once};
        use serde_json::json;
        use std::os::unix::net::UnixListener;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rpc.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve_unix_once(listener, http_response(200, "OK", b""));

        let result = sockrpc::invoke_local(&path, "/rpc/ping", &json!({})).unwrap();
        assert_eq!(result, None);

        let request = server.join().unwrap();
        assert_eq!(request.header("X-RS-RPC-Secret"), Some("from-parent-process"));
    }
}
