//! Nested function table and dotted-path resolution.
//!
//! Entries are kept in insertion order (`IndexMap`), which makes the
//! resolver's tie-break deterministic: at every level the *first inserted*
//! key whose text prefixes the remaining path wins. This is intentionally
//! not a longest-prefix match; with overlapping keys such as `"a"` and
//! `"a.b"`, whichever was registered first shadows the other. Callers that
//! register overlapping prefixes should register the more specific entry
//! first (or avoid the overlap).

use std::sync::Arc;

use indexmap::IndexMap;

use super::typed::LocalHandler;

/// One slot in a [`FunctionTable`]: either a callable or a nested table.
#[derive(Clone)]
pub enum TableEntry {
    /// A callable leaf.
    Handler(Arc<dyn LocalHandler>),
    /// A nested group of functions.
    Table(FunctionTable),
}

/// Insertion-ordered registry of callables, nested to arbitrary depth.
///
/// The table is mutable at any time; the engine resolves against the live
/// contents on every inbound request, so entries added or replaced after
/// construction are observed by subsequent dispatches. Concurrent mutation
/// from multiple threads must go through the engine's lock (see
/// [`Rpc::functions`](crate::Rpc::functions)).
#[derive(Default, Clone)]
pub struct FunctionTable {
    entries: IndexMap<String, TableEntry>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable under `name`.
    ///
    /// `name` may itself be a dotted path (flat registration); it then
    /// matches the full remaining path as a single key. Replacing an
    /// existing entry keeps its original position in the iteration order.
    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn LocalHandler>) {
        self.entries.insert(name.into(), TableEntry::Handler(handler));
    }

    /// Register a nested table under `name`.
    pub fn insert_table(&mut self, name: impl Into<String>, table: FunctionTable) {
        self.entries.insert(name.into(), TableEntry::Table(table));
    }

    /// Remove an entry by exact key.
    pub fn remove(&mut self, name: &str) -> Option<TableEntry> {
        self.entries.shift_remove(name)
    }

    /// True if an entry exists under the exact key `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries at this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when this level has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a dotted method path to a callable.
    ///
    /// At each level the first key in insertion order that prefixes the
    /// remaining path is taken; the key plus one path delimiter are consumed
    /// and resolution descends. Resolution succeeds when the fully consumed
    /// path equals a key holding a callable, and fails as soon as no key
    /// matches or a callable is reached with path left over.
    pub fn resolve(&self, path: &str) -> Option<Arc<dyn LocalHandler>> {
        let mut table = self;
        let mut rest = path;
        loop {
            let (key, entry) = table
                .entries
                .iter()
                .find(|(key, _)| rest.starts_with(key.as_str()))?;
            match entry {
                TableEntry::Handler(handler) if key.as_str() == rest => {
                    return Some(Arc::clone(handler));
                }
                TableEntry::Table(next) => {
                    rest = rest.get(key.len() + 1..).unwrap_or("");
                    table = next;
                }
                TableEntry::Handler(_) => return None,
            }
        }
    }
}
