//! Engine construction, call proxy, and lifecycle.
//!
//! [`RpcBuilder`] configures one side of a connection: the local function
//! table, the per-call timeout budget, and the error/resolution hooks.
//! [`RpcBuilder::create`] attaches the engine to a [`Transport`] and returns
//! the [`Rpc`] handle. Per-path [`MethodHandle`]s are the call proxy:
//! `invoke` is a two-way call correlated by id, `send` is fire-and-forget.
//!
//! # Example
//!
//! ```ignore
//! use duplex_rpc::{handler, FunctionTable, Rpc};
//! use duplex_rpc::transport::LocalTransport;
//! use serde_json::json;
//!
//! let (to_a, to_b) = LocalTransport::pair();
//!
//! let mut functions = FunctionTable::new();
//! functions.insert(
//!     "hello",
//!     handler::handler1(|name: String| async move { Ok(format!("Hello {name}")) }),
//! );
//! let _b = Rpc::builder().functions(functions).create(to_b);
//!
//! let a = Rpc::builder().create(to_a);
//! let greeting = a.method("hello").invoke(vec![json!("X")]).await?;
//! assert_eq!(greeting, json!("Hello X"));
//! a.close().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};
use crate::handler::{FunctionTable, LocalHandler};
use crate::ids;
use crate::pending::{PendingCall, PendingCalls};
use crate::protocol::Request;
use crate::transport::{MessageHandler, Transport};

/// Default response deadline for two-way calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Final override of function lookup per inbound request.
///
/// Receives the method path and whatever the table resolved (possibly
/// nothing) and returns the callable to use; returning `None` forces a
/// not-found outcome even when a callable existed.
pub type ResolverHook =
    dyn Fn(&str, Option<Arc<dyn LocalHandler>>) -> Option<Arc<dyn LocalHandler>> + Send + Sync;

/// Observes errors from local callables; returning `true` suppresses the
/// error response (the remote caller will eventually time out).
pub type FunctionErrorHook = dyn Fn(&RpcError, &str, &[Value]) -> bool + Send + Sync;

/// Observes serialize/post/deserialize failures; returning `true` suppresses
/// further propagation.
pub type GeneralErrorHook = dyn Fn(&RpcError, Option<&str>, Option<&[Value]>) -> bool + Send + Sync;

/// Observes per-call timeouts; returning `true` suppresses the timeout
/// rejection (the call then stays unsettled).
pub type TimeoutErrorHook = dyn Fn(&str, &[Value]) -> bool + Send + Sync;

/// Engine configuration assembled by the builder.
pub(crate) struct RpcConfig {
    pub timeout: Option<Duration>,
    pub resolver: Option<Box<ResolverHook>>,
    pub on_function_error: Option<Box<FunctionErrorHook>>,
    pub on_general_error: Option<Box<GeneralErrorHook>>,
    pub on_timeout_error: Option<Box<TimeoutErrorHook>>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            resolver: None,
            on_function_error: None,
            on_general_error: None,
            on_timeout_error: None,
        }
    }
}

/// Builder for configuring one side of an rpc connection.
pub struct RpcBuilder {
    functions: FunctionTable,
    config: RpcConfig,
}

impl RpcBuilder {
    /// Create a builder with an empty function table and default config.
    pub fn new() -> Self {
        Self {
            functions: FunctionTable::new(),
            config: RpcConfig::default(),
        }
    }

    /// Use `table` as the local function table.
    pub fn functions(mut self, table: FunctionTable) -> Self {
        self.functions = table;
        self
    }

    /// Register a single callable, keeping the rest of the table.
    pub fn handle(mut self, name: impl Into<String>, handler: Arc<dyn LocalHandler>) -> Self {
        self.functions.insert(name, handler);
        self
    }

    /// Set the response deadline for two-way calls.
    ///
    /// Default: 60 seconds. Deadlines are tracked by spawned timer tasks
    /// that die with the runtime; an armed timer never keeps the process
    /// alive on its own.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable the response deadline entirely.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Install a final override of function lookup.
    pub fn resolver<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, Option<Arc<dyn LocalHandler>>) -> Option<Arc<dyn LocalHandler>>
            + Send
            + Sync
            + 'static,
    {
        self.config.resolver = Some(Box::new(hook));
        self
    }

    /// Install a hook observing errors from local callables.
    pub fn on_function_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RpcError, &str, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.config.on_function_error = Some(Box::new(hook));
        self
    }

    /// Install a hook observing serialization and messaging failures.
    pub fn on_general_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RpcError, Option<&str>, Option<&[Value]>) -> bool + Send + Sync + 'static,
    {
        self.config.on_general_error = Some(Box::new(hook));
        self
    }

    /// Install a hook observing per-call timeouts.
    pub fn on_timeout_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.config.on_timeout_error = Some(Box::new(hook));
        self
    }

    /// Attach the engine to a transport and return its handle.
    ///
    /// Initiates inbound handler registration immediately; if the
    /// transport's `on` step is itself asynchronous, the first `invoke`
    /// awaits its completion before posting. Must be called from within a
    /// tokio runtime.
    pub fn create(self, transport: Arc<dyn Transport>) -> Rpc {
        let inner = Arc::new(RpcInner {
            transport: Arc::clone(&transport),
            functions: Arc::new(RwLock::new(self.functions)),
            pending: PendingCalls::new(),
            closed: AtomicBool::new(false),
            config: self.config,
            on_ready: Mutex::new(None),
        });

        // The transport keeps the handler alive for as long as it pumps
        // messages; a weak reference back to the engine breaks the cycle and
        // makes late deliveries after drop harmless.
        let weak = Arc::downgrade(&inner);
        let handler: MessageHandler = Arc::new(move |data| {
            let weak = Weak::clone(&weak);
            Box::pin(async move {
                match weak.upgrade() {
                    Some(inner) => inner.on_message(data).await,
                    None => Ok(()),
                }
            })
        });

        let registration = tokio::spawn(async move { transport.on(handler).await });
        *inner.on_ready.lock() = Some(registration);

        Rpc { inner }
    }
}

impl Default for RpcBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared engine state.
pub(crate) struct RpcInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) functions: Arc<RwLock<FunctionTable>>,
    pub(crate) pending: PendingCalls,
    pub(crate) closed: AtomicBool,
    pub(crate) config: RpcConfig,
    /// Pending `on` registration, awaited once before the first invoke.
    on_ready: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl RpcInner {
    pub(crate) fn hook_function_error(&self, error: &RpcError, method: &str, args: &[Value]) -> bool {
        match &self.config.on_function_error {
            Some(hook) => hook(error, method, args),
            None => false,
        }
    }

    pub(crate) fn hook_general_error(
        &self,
        error: &RpcError,
        method: Option<&str>,
        args: Option<&[Value]>,
    ) -> bool {
        match &self.config.on_general_error {
            Some(hook) => hook(error, method, args),
            None => false,
        }
    }

    /// Serialize and post one envelope value through the transport.
    pub(crate) async fn post_value(&self, value: Value) -> Result<()> {
        let data = self.transport.serialize(value)?;
        self.transport.post(data).await
    }
}

/// Handle to a running engine.
///
/// Cheaply cloneable; all clones share the same connection, function table,
/// and pending-call state.
#[derive(Clone)]
pub struct Rpc {
    inner: Arc<RpcInner>,
}

impl Rpc {
    /// Start configuring a new engine.
    pub fn builder() -> RpcBuilder {
        RpcBuilder::new()
    }

    /// Obtain the call proxy for one remote method path.
    pub fn method(&self, path: impl Into<String>) -> MethodHandle {
        MethodHandle {
            inner: Arc::clone(&self.inner),
            path: path.into(),
        }
    }

    /// The local function table, shared with the dispatcher.
    ///
    /// Entries may be added or replaced at any time; inbound requests
    /// resolve against the live contents. Mutation happens under the
    /// returned lock (single-writer discipline; the engine itself only
    /// takes read locks).
    pub fn functions(&self) -> Arc<RwLock<FunctionTable>> {
        Arc::clone(&self.inner.functions)
    }

    /// Close the engine.
    ///
    /// Marks the engine closed (irreversibly), rejects every pending call
    /// with a closed-error naming its method path, and detaches from the
    /// transport. Safe to call more than once.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.pending.drain_on_close();
        if let Err(error) = self.inner.transport.off().await {
            tracing::warn!(%error, "transport detach failed");
        }
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }
}

/// Call proxy for one remote method path.
#[derive(Clone)]
pub struct MethodHandle {
    inner: Arc<RpcInner>,
    path: String,
}

impl MethodHandle {
    /// The dotted method path this handle addresses.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Two-way call: posts a request carrying a fresh correlation id and
    /// resolves with the remote result.
    ///
    /// Fails immediately with a closed-error if the engine is closed, and
    /// with a timeout error if no response arrives within the configured
    /// budget.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Closed {
                method: self.path.clone(),
            });
        }

        // The transport's listener registration may itself be asynchronous;
        // the first call through waits for it, later calls find the slot
        // empty and proceed.
        let ready = inner.on_ready.lock().take();
        if let Some(registration) = ready {
            match registration.await {
                Ok(result) => result?,
                Err(error) => {
                    return Err(RpcError::Transport(format!(
                        "listener registration failed: {error}"
                    )))
                }
            }
        }

        let id = ids::correlation_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        inner.pending.register(
            &id,
            PendingCall {
                method: self.path.clone(),
                tx,
                timeout: None,
            },
        )?;

        if let Some(budget) = inner.config.timeout {
            let weak = Arc::downgrade(inner);
            let timer_id = id.clone();
            let method = self.path.clone();
            let timer_args = args.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                let Some(inner) = weak.upgrade() else { return };
                // Remove the entry whatever the hook decides; a response
                // arriving later is then a silent no-op.
                let Some(call) = inner.pending.take(&timer_id) else {
                    return;
                };
                let suppress = match &inner.config.on_timeout_error {
                    Some(hook) => hook(&method, &timer_args),
                    None => false,
                };
                if suppress {
                    tracing::warn!(method = %method, "call timed out (rejection suppressed by hook)");
                    drop(call);
                } else {
                    let _ = call.tx.send(Err(RpcError::Timeout { method }));
                }
            });
            if !inner.pending.set_timeout(&id, timer.abort_handle()) {
                // Settled before the timer could attach.
                timer.abort();
            }
        }

        let posted = match Request::call(id.clone(), self.path.as_str(), args).into_value() {
            Ok(value) => inner.post_value(value).await,
            Err(e) => Err(e),
        };
        if let Err(error) = posted {
            // Never reached the wire; nothing can settle this call, so
            // withdraw it and surface the failure directly.
            if let Some(call) = inner.pending.take(&id) {
                if let Some(timer) = call.timeout {
                    timer.abort();
                }
            }
            return Err(error);
        }

        match rx.await {
            Ok(outcome) => outcome,
            // The sender is dropped without a settlement only when a timeout
            // hook suppressed the rejection; honor that by staying pending.
            Err(_) => std::future::pending::<Result<Value>>().await,
        }
    }

    /// Two-way call with the result deserialized into `R`.
    pub async fn invoke_as<R: DeserializeOwned>(&self, args: Vec<Value>) -> Result<R> {
        let value = self.invoke(args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fire-and-forget: posts a request with no correlation id.
    ///
    /// Creates no pending entry, schedules no timeout, and deliberately
    /// skips the closed check, so events can still be emitted while a close
    /// is in flight. Serialization errors surface to the caller; transport
    /// failures are reported through the general-error hook.
    pub fn send(&self, args: Vec<Value>) -> Result<()> {
        let value = Request::event(self.path.as_str(), args).into_value()?;
        let data = self.inner.transport.serialize(value)?;
        let inner = Arc::clone(&self.inner);
        let method = self.path.clone();
        tokio::spawn(async move {
            if let Err(error) = inner.transport.post(data).await {
                if !inner.hook_general_error(&error, Some(&method), None) {
                    tracing::error!(method = %method, %error, "failed to post event");
                }
            }
        });
        Ok(())
    }
}
