//! Codec module - byte-level encoding for stream transports.
//!
//! The engine itself exchanges envelope values; only stream-backed
//! transports need a byte codec. Two are provided:
//!
//! - [`JsonCodec`] - UTF-8 JSON, human-readable, interoperable with
//!   anything that can parse JSON
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde`, compact binary
//!
//! Codecs are selected at compile time as a type parameter of
//! [`StreamTransport`](crate::transport::StreamTransport).

mod json;
mod msgpack;

use serde_json::Value;

use crate::error::Result;

/// Byte-level encoding for envelope values.
pub trait Codec: Send + Sync + 'static {
    /// Encode an envelope value to bytes.
    fn encode(value: &Value) -> Result<Vec<u8>>;

    /// Decode bytes back to an envelope value.
    fn decode(bytes: &[u8]) -> Result<Value>;
}

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
