//! MsgPack codec using `rmp-serde`.
//!
//! Encoding uses `to_vec_named` so maps carry their field names; positional
//! struct encoding would not survive a round trip through the
//! self-describing [`Value`] representation, and named maps keep the frames
//! readable by non-Rust MessagePack peers.

use serde_json::Value;

use super::Codec;
use crate::error::Result;

/// MessagePack codec (struct-as-map format).
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    #[inline]
    fn encode(value: &Value) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Result<Value> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
