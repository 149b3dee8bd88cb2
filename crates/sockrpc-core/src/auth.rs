//! Credentials stamped onto outgoing RPC requests.
//!
//! Two schemes exist, keyed by transport:
//!
//! - **Local sockets** carry the process-wide shared secret in
//!   `X-RS-RPC-Secret`. Both ends of the socket run inside the same trust
//!   boundary and the secret is the proof of it.
//! - **Remote sockets** carry the session cookie in `X-RS-RPC-Cookie`, read
//!   from the environment on every call, identifying the user session the
//!   call is made on behalf of.
//!
//! The shared secret is set at most once per process, either from
//! `RS_SERVER_RPC_SECRET` (which is then removed from the environment so
//! child processes never see it) or from an explicit value.

use crate::config::AuthConfig;
use crate::error::{Result, RpcError};
use crate::http::RequestEnvelope;
use std::env::{self, VarError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

static PROCESS_SECRET: OnceLock<SharedSecret> = OnceLock::new();

/// Shared secret for local-socket calls.
///
/// Immutable once built. `Debug` output never includes the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    /// Read the secret from `RS_SERVER_RPC_SECRET` and remove the variable.
    pub fn from_env() -> Self {
        Self::from_env_var(AuthConfig::SECRET_ENV_VAR)
    }

    /// Read the secret from `name` and remove the variable.
    ///
    /// A missing variable yields an empty secret.
    pub fn from_env_var(name: &str) -> Self {
        let value = match env::var(name) {
            Ok(value) => value,
            Err(VarError::NotPresent) => {
                debug!("{} is not set; RPC secret is empty", name);
                String::new()
            }
            Err(VarError::NotUnicode(_)) => {
                warn!("{} is not valid UTF-8; RPC secret is empty", name);
                String::new()
            }
        };
        env::remove_var(name);
        Self::new(value)
    }

    /// The raw secret, for stamping onto a request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SharedSecret {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("SharedSecret(<empty>)")
        } else {
            f.write_str("SharedSecret(<redacted>)")
        }
    }
}

/// Initialize the process-wide secret from `RS_SERVER_RPC_SECRET`.
///
/// The variable is removed from the environment. Fails without touching the
/// environment if the secret was already initialized.
pub fn initialize_from_environment() -> Result<()> {
    if PROCESS_SECRET.get().is_some() {
        return Err(RpcError::already_initialized());
    }
    install(SharedSecret::from_env())?;
    info!("RPC secret initialized from environment");
    Ok(())
}

/// Initialize the process-wide secret from a value handed down by the parent
/// process through a non-environment channel.
pub fn initialize_with_secret(secret: impl Into<String>) -> Result<()> {
    install(SharedSecret::new(secret))?;
    info!("RPC secret initialized explicitly");
    Ok(())
}

fn install(secret: SharedSecret) -> Result<()> {
    PROCESS_SECRET
        .set(secret)
        .map_err(|_| RpcError::already_initialized())
}

/// The process-wide secret, or `""` if it was never initialized.
pub fn current_secret() -> &'static str {
    PROCESS_SECRET.get().map(SharedSecret::expose).unwrap_or("")
}

/// Read the session cookie from `env_var`, empty if unset.
pub fn session_cookie(env_var: &str) -> String {
    match env::var(env_var) {
        Ok(value) => value,
        Err(VarError::NotPresent) => String::new(),
        Err(VarError::NotUnicode(_)) => {
            warn!("{} is not valid UTF-8; session cookie is empty", env_var);
            String::new()
        }
    }
}

/// How a request proves where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authenticator {
    /// The process-wide secret as it stands at call time, for local sockets.
    ProcessSecret,
    /// An injected shared secret, for local sockets.
    SharedSecret(SharedSecret),
    /// Session cookie read from `env_var` at call time, for remote sockets.
    ForwardedCookie { env_var: String },
}

impl Authenticator {
    /// Cookie forwarding from `RS_SESSION_RPC_COOKIE`.
    pub fn forwarded_cookie() -> Self {
        Authenticator::ForwardedCookie {
            env_var: AuthConfig::COOKIE_ENV_VAR.to_string(),
        }
    }

    /// Stamp the credential header onto `request`.
    pub fn stamp(&self, request: &mut RequestEnvelope) {
        match self {
            Authenticator::ProcessSecret => {
                request.set_header(AuthConfig::SECRET_HEADER, current_secret());
            }
            Authenticator::SharedSecret(secret) => {
                request.set_header(AuthConfig::SECRET_HEADER, secret.expose());
            }
            Authenticator::ForwardedCookie { env_var } => {
                request.set_header(AuthConfig::COOKIE_HEADER, session_cookie(env_var));
            }
        }
    }
}
