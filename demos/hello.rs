//! Back-to-back hello - simple two-way call example.
//!
//! Wires two engines over an in-process pair transport. Bob exposes a
//! `hello` function; Alice invokes it and prints the greeting.
//!
//! Run with `cargo run --example hello`.

use duplex_rpc::transport::LocalTransport;
use duplex_rpc::{handler, FunctionTable, Rpc};
use serde_json::json;

#[tokio::main]
async fn main() -> duplex_rpc::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (to_alice, to_bob) = LocalTransport::pair();

    let mut bob_fns = FunctionTable::new();
    bob_fns.insert(
        "hello",
        handler::handler1(|name: String| async move {
            Ok(format!("Hello {name}, my name is Bob"))
        }),
    );
    let bob = Rpc::builder().functions(bob_fns).create(to_bob);

    let alice = Rpc::builder().create(to_alice);
    let greeting: String = alice.method("hello").invoke_as(vec![json!("Alice")]).await?;
    println!("{greeting}");

    alice.close().await;
    bob.close().await;
    Ok(())
}
