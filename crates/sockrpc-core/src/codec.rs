//! JSON wire codec for request and response bodies.
//!
//! Encoding produces compact JSON text. Decoding is all-or-nothing: trailing
//! data or invalid UTF-8 fails the whole body.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Serialize a payload to JSON bytes.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(payload)
}

/// Parse a body into a JSON value.
pub fn decode(bytes: &[u8]) -> serde_json::Result<Value> {
    serde_json::from_slice(bytes)
}

/// Convert an already-decoded value into a concrete type.
pub fn decode_value<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    serde_json::from_value(value)
}
