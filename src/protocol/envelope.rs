//! Wire envelope encoding and decoding.
//!
//! Envelopes are exchanged as [`serde_json::Value`] trees so that transports
//! can apply their own serialize/deserialize step (identity by default).
//! Field names are single letters to keep the envelope overhead small on
//! text codecs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RpcError};

/// Tag value marking a request envelope.
pub const TAG_REQUEST: u8 = 0;

/// Tag value marking a response envelope.
pub const TAG_RESPONSE: u8 = 1;

/// A call or event sent to the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Envelope tag, always [`TAG_REQUEST`].
    pub t: u8,
    /// Correlation id; present iff the caller expects a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i: Option<String>,
    /// Dotted method path.
    pub m: String,
    /// Positional arguments.
    pub a: Vec<Value>,
}

impl Request {
    /// Build a two-way call request carrying a correlation id.
    pub fn call(id: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            t: TAG_REQUEST,
            i: Some(id.into()),
            m: method.into(),
            a: args,
        }
    }

    /// Build a fire-and-forget event request with no correlation id.
    pub fn event(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            t: TAG_REQUEST,
            i: None,
            m: method.into(),
            a: args,
        }
    }

    /// Encode into a wire value.
    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The answer to a two-way call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Envelope tag, always [`TAG_RESPONSE`].
    pub t: u8,
    /// Correlation id of the call being answered.
    pub i: String,
    /// Success value. Absent (or null) on error responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<Value>,
    /// Error value. Absent (or null) on success responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Value>,
}

impl Response {
    /// Build a success response. `result` may be `None` for calls that
    /// resolve with no value.
    pub fn ok(id: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            t: TAG_RESPONSE,
            i: id.into(),
            r: result,
            e: None,
        }
    }

    /// Build an error response.
    pub fn err(id: impl Into<String>, error: Value) -> Self {
        Self {
            t: TAG_RESPONSE,
            i: id.into(),
            r: None,
            e: Some(error),
        }
    }

    /// Encode into a wire value.
    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// An inbound call or event.
    Request(Request),
    /// An inbound answer to one of our calls.
    Response(Response),
}

impl Envelope {
    /// Decode a wire value into an envelope, dispatching on the `t` tag.
    pub fn from_value(value: Value) -> Result<Self> {
        let tag = value
            .get("t")
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::Protocol("message has no envelope tag".into()))?;
        match tag {
            t if t == u64::from(TAG_REQUEST) => {
                Ok(Envelope::Request(serde_json::from_value(value)?))
            }
            t if t == u64::from(TAG_RESPONSE) => {
                Ok(Envelope::Response(serde_json::from_value(value)?))
            }
            other => Err(RpcError::Protocol(format!(
                "unknown envelope tag: {other}"
            ))),
        }
    }
}
