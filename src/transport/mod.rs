//! Transport module - the duplex channel contract and bundled transports.
//!
//! The engine never touches a transport medium directly; it talks to a
//! [`Transport`] that supplies three primitives:
//!
//! - `post` - emit one serialized envelope to the peer
//! - `on` - register the single inbound handler; may itself be
//!   asynchronous, in which case the engine awaits it once before its first
//!   outbound call
//! - `off` - deregister on close (optional; the default is a no-op detach,
//!   and the engine tolerates deliveries that arrive afterward)
//!
//! plus an optional per-transport serialize/deserialize step, identity by
//! default. Bundled implementations:
//!
//! - [`LocalTransport`] - in-process pair over tokio channels
//! - [`StreamTransport`] - length-prefixed frames over any
//!   `AsyncRead`/`AsyncWrite` pair

mod local;
mod stream;

use serde_json::Value;

use crate::error::Result;
use crate::handler::BoxFuture;

pub use local::LocalTransport;
pub use stream::{FrameBuffer, StreamTransport, DEFAULT_MAX_FRAME_SIZE};

/// The engine's inbound handler, invoked once per delivered message.
///
/// The returned result lets a transport observe dispatch failures (for
/// example to drop a connection on repeated protocol errors); transports may
/// also ignore it.
pub type MessageHandler =
    std::sync::Arc<dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A duplex message channel connecting two rpc engines.
pub trait Transport: Send + Sync + 'static {
    /// Emit one serialized envelope to the peer.
    fn post(&self, data: Value) -> BoxFuture<'_, Result<()>>;

    /// Register the single inbound handler.
    ///
    /// Called exactly once per engine. The future may complete after real
    /// registration work (socket subscription, thread startup); the engine
    /// awaits it once before its first outbound call.
    fn on(&self, handler: MessageHandler) -> BoxFuture<'_, Result<()>>;

    /// Deregister the inbound handler.
    ///
    /// Transports without a meaningful detach keep the default no-op; the
    /// engine ignores late deliveries after close either way.
    fn off(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Transform an envelope value before posting. Identity by default.
    fn serialize(&self, value: Value) -> Result<Value> {
        Ok(value)
    }

    /// Transform a received value before dispatch. Identity by default.
    fn deserialize(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}
