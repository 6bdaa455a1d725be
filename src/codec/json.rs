//! JSON codec using `serde_json`.

use serde_json::Value;

use super::Codec;
use crate::error::Result;

/// UTF-8 JSON codec.
pub struct JsonCodec;

impl Codec for JsonCodec {
    #[inline]
    fn encode(value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
