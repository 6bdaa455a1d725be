//! # duplex-rpc
//!
//! Symmetric, bidirectional RPC over any duplex message channel.
//!
//! Both sides of a connection run the same engine: each exposes a local
//! table of callable functions and obtains per-path handles to the other
//! side's functions, so either side may call or receive calls through the
//! same channel. The engine owns correlation-id generation, pending-call
//! bookkeeping, timeouts, inbound dispatch, and shutdown; the channel itself
//! is supplied by the caller as a [`Transport`].
//!
//! ## Architecture
//!
//! - **Call proxy** ([`MethodHandle`]): `invoke` posts a request with a
//!   fresh correlation id and resolves with the remote result; `send` is
//!   fire-and-forget with no id and no response.
//! - **Correlation table**: pending calls keyed by id, settled exactly once
//!   by a matching response, the per-call timeout, or engine close.
//! - **Dispatcher**: turns each inbound payload into the matching
//!   side-effect, resolving dotted method paths against the live function
//!   table.
//! - **Lifecycle**: [`Rpc::close`] rejects every pending call and detaches
//!   from the transport, irreversibly.
//!
//! ## Example
//!
//! ```ignore
//! use duplex_rpc::{handler, FunctionTable, Rpc};
//! use duplex_rpc::transport::LocalTransport;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> duplex_rpc::Result<()> {
//!     let (to_alice, to_bob) = LocalTransport::pair();
//!
//!     let mut bob_fns = FunctionTable::new();
//!     bob_fns.insert(
//!         "hi",
//!         handler::handler1(|name: String| async move {
//!             Ok(format!("Hi {name}, I am Bob"))
//!         }),
//!     );
//!     let bob = Rpc::builder().functions(bob_fns).create(to_bob);
//!
//!     let alice = Rpc::builder().create(to_alice);
//!     let reply: String = alice.method("hi").invoke_as(vec![json!("Alice")]).await?;
//!     assert_eq!(reply, "Hi Alice, I am Bob");
//!
//!     alice.close().await;
//!     bob.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod ids;
pub mod pending;
pub mod protocol;
pub mod transport;

mod dispatch;
mod rpc;

pub use error::{Result, RpcError};
pub use handler::{BoxFuture, FunctionTable, LocalHandler};
pub use rpc::{
    FunctionErrorHook, GeneralErrorHook, MethodHandle, ResolverHook, Rpc, RpcBuilder,
    TimeoutErrorHook, DEFAULT_TIMEOUT,
};
pub use transport::Transport;
