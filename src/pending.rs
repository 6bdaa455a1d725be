//! Pending-call bookkeeping: the correlation table.
//!
//! The table is the single source of truth for outstanding two-way calls.
//! A [`PendingCall`] lives here from the moment its request is posted until
//! exactly one of three settlement paths claims it: a matching response, the
//! per-call timeout, or engine close. Every path removes the entry, so a
//! second settlement attempt finds nothing and is a no-op.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{Result, RpcError};

/// Outcome delivered to an awaiting caller.
pub type CallResult = std::result::Result<Value, RpcError>;

/// In-memory record of one outstanding two-way call.
pub struct PendingCall {
    /// Dotted method path, kept for error messages on timeout/close.
    pub method: String,
    /// Settles the caller's future. Consumed by the first settlement.
    pub tx: oneshot::Sender<CallResult>,
    /// Abort handle for the per-call timeout task, once scheduled.
    pub timeout: Option<AbortHandle>,
}

impl PendingCall {
    fn complete(self, outcome: CallResult) {
        if let Some(handle) = self.timeout {
            handle.abort();
        }
        // A dropped receiver means the caller stopped waiting; settlement
        // stays unobservable either way.
        let _ = self.tx.send(outcome);
    }
}

/// Map from correlation id to pending call. Pure bookkeeping, no I/O.
#[derive(Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<String, PendingCall>>,
}

impl PendingCalls {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under a fresh id.
    ///
    /// Fails defensively if the id is already pending; the id space makes
    /// this effectively unreachable (see [`crate::ids`]) but a collision must
    /// not silently clobber another call.
    pub fn register(&self, id: &str, call: PendingCall) -> Result<()> {
        let mut calls = self.calls.lock();
        if calls.contains_key(id) {
            return Err(RpcError::Protocol(format!(
                "correlation id \"{id}\" is already pending"
            )));
        }
        calls.insert(id.to_string(), call);
        Ok(())
    }

    /// Attach a timeout abort handle to an already-registered call.
    ///
    /// Returns `false` if the call settled before the timer could attach, in
    /// which case the caller should abort the timer itself.
    pub fn set_timeout(&self, id: &str, handle: AbortHandle) -> bool {
        match self.calls.lock().get_mut(id) {
            Some(call) => {
                call.timeout = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Settle a call with the fields of a response envelope.
    ///
    /// An id with no pending entry is silently dropped: the call may already
    /// have timed out, or the peer sent a duplicate response.
    pub fn settle(&self, id: &str, result: Option<Value>, error: Option<Value>) {
        let Some(call) = self.calls.lock().remove(id) else {
            tracing::debug!(id, "dropping response with no pending call");
            return;
        };
        let outcome = match error {
            Some(value) => Err(RpcError::Remote {
                method: call.method.clone(),
                value,
            }),
            None => Ok(result.unwrap_or(Value::Null)),
        };
        call.complete(outcome);
    }

    /// Remove and return a call without settling it (timeout path).
    pub fn take(&self, id: &str) -> Option<PendingCall> {
        self.calls.lock().remove(id)
    }

    /// Reject every remaining call with a closed-error naming its method
    /// path, abort every timer, and empty the table.
    pub fn drain_on_close(&self) {
        let drained: Vec<PendingCall> = {
            let mut calls = self.calls.lock();
            calls.drain().map(|(_, call)| call).collect()
        };
        for call in drained {
            let method = call.method.clone();
            call.complete(Err(RpcError::Closed { method }));
        }
    }

    /// Number of currently pending calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// True when no call is pending.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}
