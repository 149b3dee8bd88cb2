//! Response interpretation.
//!
//! Maps a raw response envelope onto the call outcome:
//!
//! | Response                 | Outcome                |
//! |--------------------------|------------------------|
//! | status other than 200    | `Err(Execution)`       |
//! | 200, empty body          | `Ok(None)` (absent)    |
//! | 200, body is not JSON    | `Err(Parse)`           |
//! | 200, JSON body           | `Ok(Some(value))`      |

use crate::codec;
use crate::config::ProtocolConfig;
use crate::error::{Result, RpcError};
use crate::http::ResponseEnvelope;
use serde_json::Value;
use tracing::warn;

/// Interpret the response to a call made against `endpoint`.
pub fn interpret(endpoint: &str, response: &ResponseEnvelope) -> Result<Option<Value>> {
    if response.status_code() != ProtocolConfig::SUCCESS_STATUS {
        warn!(
            endpoint,
            status = response.status_code(),
            status_message = response.status_message(),
            body = %response.body_text(),
            "Server RPC failed"
        );
        return Err(RpcError::execution(
            endpoint,
            response.status_code(),
            response.status_message(),
        ));
    }

    // An empty body is a successful call with nothing to report.
    if response.body().is_empty() {
        return Ok(None);
    }

    match codec::decode(response.body()) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(
                endpoint,
                body = %response.body_text(),
                "Received unparseable result from server RPC"
            );
            Err(RpcError::parse(endpoint, e))
        }
    }
}
