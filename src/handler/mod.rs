//! Handler module - the local function table and dotted-path resolution.
//!
//! Provides:
//! - [`FunctionTable`] - nested, insertion-ordered registry of callables
//! - [`LocalHandler`] - object-safe trait every callable implements
//! - typed adapters ([`handler0`], [`handler1`], [`handler2`], [`raw`]) that
//!   wrap async closures over deserialized arguments
//!
//! # Example
//!
//! ```ignore
//! use duplex_rpc::handler::{self, FunctionTable};
//!
//! let mut table = FunctionTable::new();
//! table.insert(
//!     "hello",
//!     handler::handler1(|name: String| async move { Ok(format!("Hello {name}")) }),
//! );
//!
//! let mut math = FunctionTable::new();
//! math.insert("add", handler::handler2(|a: i64, b: i64| async move { Ok(a + b) }));
//! table.insert_table("math", math);
//! ```

mod table;
mod typed;

pub use table::{FunctionTable, TableEntry};
pub use typed::{handler0, handler1, handler2, raw, BoxFuture, LocalHandler};
