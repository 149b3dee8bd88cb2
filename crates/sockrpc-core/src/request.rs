//! Request envelope construction.

use crate::codec;
use crate::config::ProtocolConfig;
use crate::error::{Result, RpcError};
use crate::http::RequestEnvelope;
use serde::Serialize;

/// Build the request envelope for one RPC call.
///
/// Every call is a `POST` to `endpoint` on a fresh connection that is closed
/// after the response, with the JSON-encoded payload as body. Credentials are
/// stamped separately by the [`Authenticator`](crate::auth::Authenticator).
///
/// An endpoint that cannot appear in a request line is an `InvalidRequest`
/// error.
pub fn build_request<P: Serialize + ?Sized>(
    endpoint: &str,
    payload: &P,
) -> Result<RequestEnvelope> {
    let body = codec::encode(payload).map_err(RpcError::encode)?;

    let mut request = RequestEnvelope::new(ProtocolConfig::METHOD, endpoint);
    request.set_header(
        ProtocolConfig::CONNECTION_HEADER,
        ProtocolConfig::CONNECTION_CLOSE,
    );
    request.set_body(body);
    request.validate()?;
    Ok(request)
}
