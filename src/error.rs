//! Error types for duplex-rpc.

use serde_json::Value;
use thiserror::Error;

/// Main error type for all rpc operations.
///
/// Every variant that relates to a specific call names the offending method
/// path in its message, so a rejected call is traceable without extra
/// context.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The engine was closed before or during the call.
    ///
    /// Never suppressible by hooks; always surfaced to the caller.
    #[error("rpc is closed, cannot call \"{method}\"")]
    Closed {
        /// Dotted path of the attempted call.
        method: String,
    },

    /// No callable resolved for the requested method path.
    #[error("function \"{method}\" not found")]
    NotFound {
        /// Dotted path that failed to resolve.
        method: String,
    },

    /// No matching response arrived within the configured window.
    #[error("timeout on calling \"{method}\"")]
    Timeout {
        /// Dotted path of the timed-out call.
        method: String,
    },

    /// A local callable failed while handling an inbound request.
    #[error("function \"{method}\" failed: {message}")]
    Function {
        /// Dotted path of the callable that failed.
        method: String,
        /// Rendered error from the callable.
        message: String,
    },

    /// The remote side answered with an error value.
    #[error("remote error on \"{method}\": {value}")]
    Remote {
        /// Dotted path of the original call.
        method: String,
        /// Error value carried by the response envelope.
        value: Value,
    },

    /// JSON value (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// I/O error from a stream-backed transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation (malformed envelope, duplicate correlation id).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The underlying transport failed to deliver a message.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RpcError {
    /// Render this error as a wire value for a response envelope.
    ///
    /// The remote peer receives the rendered message only; local error
    /// structure never crosses the wire.
    pub fn to_wire_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;
