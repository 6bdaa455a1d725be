//! Integration tests for duplex-rpc.
//!
//! Two engines are wired back-to-back over the in-process pair transport
//! and exercised through the public API, covering call/response
//! correlation, timeouts, close semantics, and dynamic function tables.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use duplex_rpc::codec::JsonCodec;
use duplex_rpc::transport::{LocalTransport, MessageHandler, StreamTransport, Transport};
use duplex_rpc::{handler, BoxFuture, FunctionTable, Rpc, RpcError};

/// Function table with a `hello` greeter, as one side of most tests.
fn greeter_functions() -> FunctionTable {
    let mut table = FunctionTable::new();
    table.insert(
        "hello",
        handler::handler1(|name: String| async move { Ok(format!("Hello {name}")) }),
    );
    table
}

/// A callable that never completes, for timeout and close tests.
fn never_completes() -> Arc<dyn duplex_rpc::LocalHandler> {
    handler::raw(|_args: Vec<Value>| std::future::pending::<duplex_rpc::Result<Value>>())
}

fn connected(a_fns: FunctionTable, b_fns: FunctionTable) -> (Rpc, Rpc) {
    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder().functions(a_fns).create(half_a);
    let b = Rpc::builder().functions(b_fns).create(half_b);
    (a, b)
}

#[tokio::test]
async fn test_back_to_back_hello() {
    let (a, _b) = connected(FunctionTable::new(), greeter_functions());

    let greeting: String = a
        .method("hello")
        .invoke_as(vec![json!("X")])
        .await
        .unwrap();
    assert_eq!(greeting, "Hello X");
}

#[tokio::test]
async fn test_calls_flow_in_both_directions() {
    let mut alice_fns = FunctionTable::new();
    alice_fns.insert(
        "hello",
        handler::handler1(|name: String| async move {
            Ok(format!("Hello {name}, my name is Alice"))
        }),
    );
    let mut bob_fns = FunctionTable::new();
    bob_fns.insert(
        "hi",
        handler::handler1(|name: String| async move { Ok(format!("Hi {name}, I am Bob")) }),
    );

    let (alice, bob) = connected(alice_fns, bob_fns);

    let from_bob: String = bob
        .method("hello")
        .invoke_as(vec![json!("Bob")])
        .await
        .unwrap();
    assert_eq!(from_bob, "Hello Bob, my name is Alice");

    let from_alice: String = alice
        .method("hi")
        .invoke_as(vec![json!("Alice")])
        .await
        .unwrap();
    assert_eq!(from_alice, "Hi Alice, I am Bob");
}

#[tokio::test]
async fn test_nested_table_resolves_dotted_path() {
    let mut math = FunctionTable::new();
    math.insert(
        "add",
        handler::handler2(|a: i64, b: i64| async move { Ok(a + b) }),
    );
    let mut fns = FunctionTable::new();
    fns.insert_table("math", math);

    let (a, _b) = connected(FunctionTable::new(), fns);
    let sum: i64 = a
        .method("math.add")
        .invoke_as(vec![json!(2), json!(3)])
        .await
        .unwrap();
    assert_eq!(sum, 5);
}

#[tokio::test]
async fn test_unregistered_path_rejects_not_found() {
    let (a, _b) = connected(FunctionTable::new(), greeter_functions());

    let err = a.method("foo").invoke(vec![json!("Bob")]).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("foo"), "message was: {message}");
    assert!(message.contains("not found"), "message was: {message}");
    assert_eq!(a.pending_calls(), 0);
}

#[tokio::test]
async fn test_round_trip_preserves_values() {
    let mut fns = FunctionTable::new();
    fns.insert(
        "echo",
        handler::raw(|args: Vec<Value>| async move {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        }),
    );
    fns.insert("nothing", handler::handler0(|| async { Ok(Value::Null) }));

    let (a, _b) = connected(FunctionTable::new(), fns);

    let nested = json!({"list": [1, 2.5, "three"], "inner": {"flag": true, "gap": null}});
    let echoed = a.method("echo").invoke(vec![nested.clone()]).await.unwrap();
    assert_eq!(echoed, nested);

    // A call that resolves with no value comes back as null.
    let nothing = a.method("nothing").invoke(vec![]).await.unwrap();
    assert_eq!(nothing, Value::Null);
}

#[tokio::test]
async fn test_timeout_rejects_with_method_path() {
    let mut fns = FunctionTable::new();
    fns.insert("slow", never_completes());

    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder()
        .timeout(Duration::from_millis(10))
        .create(half_a);
    let _b = Rpc::builder().functions(fns).create(half_b);

    let started = Instant::now();
    let err = a.method("slow").invoke(vec![]).await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout { .. }));
    assert!(err.to_string().contains("slow"));
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert_eq!(a.pending_calls(), 0);
}

#[tokio::test]
async fn test_timeout_hook_suppresses_rejection() {
    let mut fns = FunctionTable::new();
    fns.insert("slow", never_completes());
    let fired = Arc::new(AtomicBool::new(false));

    let (half_a, half_b) = LocalTransport::pair();
    let hook_fired = fired.clone();
    let a = Rpc::builder()
        .timeout(Duration::from_millis(10))
        .on_timeout_error(move |method, _args| {
            assert_eq!(method, "slow");
            hook_fired.store(true, Ordering::SeqCst);
            true
        })
        .create(half_a);
    let _b = Rpc::builder().functions(fns).create(half_b);

    // Suppressed timeout: the entry is removed but the future stays
    // unsettled, so awaiting it runs into our own deadline instead.
    let outcome =
        tokio::time::timeout(Duration::from_millis(100), a.method("slow").invoke(vec![])).await;
    assert!(outcome.is_err());
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(a.pending_calls(), 0);
}

#[tokio::test]
async fn test_close_rejects_all_pending_calls() {
    let mut fns = FunctionTable::new();
    fns.insert("first", never_completes());
    fns.insert("second", never_completes());

    let (a, _b) = connected(FunctionTable::new(), fns);

    let c1 = tokio::spawn({
        let a = a.clone();
        async move { a.method("first").invoke(vec![]).await }
    });
    let c2 = tokio::spawn({
        let a = a.clone();
        async move { a.method("second").invoke(vec![]).await }
    });

    // Let both calls register and post before closing.
    while a.pending_calls() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    a.close().await;

    let e1 = c1.await.unwrap().unwrap_err();
    let e2 = c2.await.unwrap().unwrap_err();
    assert!(matches!(e1, RpcError::Closed { .. }));
    assert!(matches!(e2, RpcError::Closed { .. }));
    assert!(e1.to_string().contains("first"));
    assert!(e2.to_string().contains("second"));
    assert_eq!(a.pending_calls(), 0);
    assert!(a.is_closed());
}

/// Transport wrapper counting posted envelopes.
struct CountingTransport {
    inner: Arc<LocalTransport>,
    posts: AtomicUsize,
}

impl Transport for CountingTransport {
    fn post(&self, data: Value) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        self.inner.post(data)
    }

    fn on(&self, handler: MessageHandler) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        self.inner.on(handler)
    }

    fn off(&self) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        self.inner.off()
    }
}

#[tokio::test]
async fn test_invoke_after_close_posts_nothing() {
    let (half_a, _half_b) = LocalTransport::pair();
    let counting = Arc::new(CountingTransport {
        inner: half_a,
        posts: AtomicUsize::new(0),
    });
    let a = Rpc::builder().create(counting.clone());

    a.close().await;
    let err = a.method("hello").invoke(vec![json!("X")]).await.unwrap_err();
    assert!(matches!(err, RpcError::Closed { .. }));
    assert!(err.to_string().contains("hello"));
    assert_eq!(counting.posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stale_response_is_silently_dropped() {
    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder().functions(greeter_functions()).create(half_a);

    // Hand-post a response that correlates with nothing.
    half_b
        .post(json!({"t": 1, "i": "no-such-call", "r": 42}))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(a.pending_calls(), 0);
    assert!(!a.is_closed());
}

#[tokio::test]
async fn test_send_is_fire_and_forget() {
    let boom_called = Arc::new(AtomicBool::new(false));
    let error_seen = Arc::new(AtomicBool::new(false));

    let mut fns = FunctionTable::new();
    let called = boom_called.clone();
    fns.insert(
        "boom",
        handler::raw(move |_args: Vec<Value>| {
            called.store(true, Ordering::SeqCst);
            async { Err(RpcError::Transport("it broke".into())) }
        }),
    );

    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder().create(half_a);
    let seen = error_seen.clone();
    let _b = Rpc::builder()
        .functions(fns)
        .on_function_error(move |_error, method, _args| {
            assert_eq!(method, "boom");
            seen.store(true, Ordering::SeqCst);
            false
        })
        .create(half_b);

    a.method("boom").send(vec![json!(1)]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The remote function ran and failed, but nothing came back: no pending
    // entry was ever created on the sending side.
    assert!(boom_called.load(Ordering::SeqCst));
    assert!(error_seen.load(Ordering::SeqCst));
    assert_eq!(a.pending_calls(), 0);
}

#[tokio::test]
async fn test_function_table_mutable_after_construction() {
    let (a, b) = connected(FunctionTable::new(), FunctionTable::new());

    let err = a.method("bar").invoke(vec![json!("A")]).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    b.functions().write().insert(
        "bar",
        handler::handler1(|name: String| async move {
            Ok(format!("A late function, called by {name}"))
        }),
    );

    let result: String = a.method("bar").invoke_as(vec![json!("A")]).await.unwrap();
    assert_eq!(result, "A late function, called by A");
}

#[tokio::test]
async fn test_resolver_hook_overrides_lookup() {
    let custom_enabled = Arc::new(AtomicBool::new(false));

    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder().create(half_a);
    let enabled = custom_enabled.clone();
    let _b = Rpc::builder()
        .functions(greeter_functions())
        .resolver(move |method, resolved| {
            if method == "foo" && enabled.load(Ordering::SeqCst) {
                return Some(handler::handler1(|name: String| async move {
                    Ok(format!("Custom resolve function to {name}"))
                }));
            }
            if method == "hello" {
                // Veto an existing callable.
                return None;
            }
            resolved
        })
        .create(half_b);

    // Vetoed path reports not-found despite the table entry.
    let err = a.method("hello").invoke(vec![json!("X")]).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    // Unknown path stays unknown until the resolver supplies a callable.
    let err = a.method("foo").invoke(vec![json!("Bob")]).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    custom_enabled.store(true, Ordering::SeqCst);
    let result: String = a.method("foo").invoke_as(vec![json!("Bob")]).await.unwrap();
    assert_eq!(result, "Custom resolve function to Bob");
}

/// Transport whose listener registration takes real time.
struct SlowRegistration {
    inner: Arc<LocalTransport>,
}

impl Transport for SlowRegistration {
    fn post(&self, data: Value) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        self.inner.post(data)
    }

    fn on(&self, handler: MessageHandler) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.inner.on(handler).await
        })
    }

    fn off(&self) -> BoxFuture<'_, duplex_rpc::Result<()>> {
        self.inner.off()
    }
}

#[tokio::test]
async fn test_first_invoke_awaits_async_registration() {
    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder().create(Arc::new(SlowRegistration { inner: half_a }));
    let _b = Rpc::builder().functions(greeter_functions()).create(half_b);

    // Invoking immediately still works: the call waits for the listener
    // registration to finish before posting.
    let greeting: String = a
        .method("hello")
        .invoke_as(vec![json!("early bird")])
        .await
        .unwrap();
    assert_eq!(greeting, "Hello early bird");
}

#[tokio::test]
async fn test_general_error_hook_sees_undecodable_message() {
    let hook_fired = Arc::new(AtomicBool::new(false));

    let (half_a, half_b) = LocalTransport::pair();
    let fired = hook_fired.clone();
    let a = Rpc::builder()
        .functions(greeter_functions())
        .on_general_error(move |_error, _method, _args| {
            fired.store(true, Ordering::SeqCst);
            true
        })
        .create(half_a);

    half_b.post(json!("not an envelope")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(hook_fired.load(Ordering::SeqCst));
    assert!(!a.is_closed());
}

#[tokio::test]
async fn test_function_error_hook_can_withhold_response() {
    let mut fns = FunctionTable::new();
    fns.insert(
        "fragile",
        handler::raw(|_args: Vec<Value>| async {
            Err(RpcError::Transport("inner failure".into()))
        }),
    );

    let (half_a, half_b) = LocalTransport::pair();
    let a = Rpc::builder()
        .timeout(Duration::from_millis(30))
        .create(half_a);
    let _b = Rpc::builder()
        .functions(fns)
        .on_function_error(|_error, _method, _args| true)
        .create(half_b);

    // With the response withheld, the caller times out instead of seeing
    // the remote failure.
    let err = a.method("fragile").invoke(vec![]).await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout { .. }));
}

#[tokio::test]
async fn test_remote_function_error_reaches_caller() {
    let mut fns = FunctionTable::new();
    fns.insert(
        "fragile",
        handler::raw(|_args: Vec<Value>| async {
            Err(RpcError::Transport("inner failure".into()))
        }),
    );

    let (a, _b) = connected(FunctionTable::new(), fns);
    let err = a.method("fragile").invoke(vec![]).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("fragile"), "message was: {message}");
    assert!(message.contains("inner failure"), "message was: {message}");
}

#[tokio::test]
async fn test_engines_over_stream_transport() {
    let (left, right) = tokio::io::duplex(64 * 1024);
    let (read_l, write_l) = tokio::io::split(left);
    let (read_r, write_r) = tokio::io::split(right);

    let transport_a: Arc<StreamTransport<_, JsonCodec>> = StreamTransport::new(read_l, write_l);
    let transport_b: Arc<StreamTransport<_, JsonCodec>> = StreamTransport::new(read_r, write_r);
    let a = Rpc::builder().create(transport_a);
    let _b = Rpc::builder()
        .functions(greeter_functions())
        .create(transport_b);

    let greeting: String = a
        .method("hello")
        .invoke_as(vec![json!("stream")])
        .await
        .unwrap();
    assert_eq!(greeting, "Hello stream");
}
