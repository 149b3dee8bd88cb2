//! sockrpc - command-line client for sockrpc endpoints.
//!
//! Performs a single call and prints the JSON result to stdout. An absent
//! result (empty 200 response) prints nothing.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use sockrpc::{RpcClient, Target};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sockrpc")]
#[command(about = "Invoke a JSON-RPC endpoint over a local socket or TCP/TLS")]
struct Args {
    /// Endpoint path, e.g. /rpc/get_status
    endpoint: String,

    /// JSON payload
    #[arg(default_value = "{}")]
    payload: String,

    /// Unix socket to call (authenticated with RS_SERVER_RPC_SECRET)
    #[arg(long, conflicts_with_all = ["host", "tls"])]
    socket: Option<PathBuf>,

    /// Remote host to call (authenticated with the session cookie)
    #[arg(long, requires = "port")]
    host: Option<String>,

    /// Remote port
    #[arg(long)]
    port: Option<u16>,

    /// Use TLS for the remote call
    #[arg(long)]
    tls: bool,

    /// Environment variable holding the session cookie for remote calls
    #[arg(long, default_value = "RS_SESSION_RPC_COOKIE")]
    cookie_env: String,

    /// Read/write timeout in seconds (0 = none)
    #[arg(long, default_value = "0")]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Scrub the secret before anything else can observe the environment.
    sockrpc::initialize_from_environment().context("Failed to initialize RPC secret")?;

    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let payload: Value = serde_json::from_str(&args.payload)
        .with_context(|| format!("Payload is not valid JSON: {}", args.payload))?;

    let target = match (&args.socket, &args.host) {
        #[cfg(unix)]
        (Some(socket), None) => Target::LocalSocket(socket.clone()),
        #[cfg(not(unix))]
        (Some(_), None) => bail!("--socket is only supported on Unix"),
        (None, Some(host)) => Target::Remote {
            address: host.clone(),
            port: args.port.context("--port is required with --host")?,
            use_tls: args.tls,
        },
        _ => bail!("Specify exactly one of --socket or --host"),
    };
    debug!("Calling {} via {:?}", args.endpoint, target);

    let mut builder = RpcClient::builder(target).cookie_env_var(&args.cookie_env);
    if args.timeout > 0 {
        let timeout = Duration::from_secs(args.timeout);
        builder = builder.connect_timeout(timeout).io_timeout(timeout);
    }
    let client = builder.build();

    let result = client
        .invoke(&args.endpoint, &payload)
        .with_context(|| format!("RPC {} failed", args.endpoint))?;

    if let Some(value) = result {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    Ok(())
}
