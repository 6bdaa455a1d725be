//! Fire-and-forget events - one-way calls with no response.
//!
//! One side emits `bump` events with `send`; the other side counts them.
//! Events carry no correlation id, create no pending state, and never
//! produce a response, even when the handler fails.
//!
//! Run with `cargo run --example events`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use duplex_rpc::transport::LocalTransport;
use duplex_rpc::{handler, FunctionTable, Rpc};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> duplex_rpc::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let counter = Arc::new(AtomicU64::new(0));

    let (to_emitter, to_counter) = LocalTransport::pair();

    let mut counting_fns = FunctionTable::new();
    let count = counter.clone();
    counting_fns.insert(
        "bump",
        handler::raw(move |_args: Vec<Value>| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::Null) }
        }),
    );
    let counting_side = Rpc::builder().functions(counting_fns).create(to_counter);

    let emitter = Rpc::builder().create(to_emitter);
    let bump = emitter.method("bump");
    for n in 0..5 {
        bump.send(vec![json!(n)])?;
    }

    // Give the events time to land; send offers no acknowledgment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("received {} bumps", counter.load(Ordering::SeqCst));

    emitter.close().await;
    counting_side.close().await;
    Ok(())
}
