//! In-process pair transport over tokio channels.
//!
//! [`LocalTransport::pair`] returns two connected halves; whatever one half
//! posts, the other half's handler receives. Messages posted before the
//! peer registers its handler are buffered in the channel and delivered as
//! soon as the pump starts.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::{MessageHandler, Transport};
use crate::error::{Result, RpcError};
use crate::handler::BoxFuture;

/// One half of an in-process duplex channel.
pub struct LocalTransport {
    /// Outbound side: feeds the peer's inbox.
    tx: mpsc::UnboundedSender<Value>,
    /// Inbound side, taken by the pump task on `on`.
    rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    /// Abort handle for the pump task, once running.
    pump: Mutex<Option<AbortHandle>>,
}

impl LocalTransport {
    /// Create two connected transport halves.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = Arc::new(Self {
            tx: tx_a,
            rx: Mutex::new(Some(rx_b)),
            pump: Mutex::new(None),
        });
        let b = Arc::new(Self {
            tx: tx_b,
            rx: Mutex::new(Some(rx_a)),
            pump: Mutex::new(None),
        });
        (a, b)
    }
}

impl Transport for LocalTransport {
    fn post(&self, data: Value) -> BoxFuture<'_, Result<()>> {
        let sent = self
            .tx
            .send(data)
            .map_err(|_| RpcError::Transport("peer channel closed".into()));
        Box::pin(async move { sent })
    }

    fn on(&self, handler: MessageHandler) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let Some(mut rx) = self.rx.lock().take() else {
                return Err(RpcError::Transport(
                    "inbound handler already registered".into(),
                ));
            };
            let task = tokio::spawn(async move {
                while let Some(value) = rx.recv().await {
                    if let Err(error) = handler(value).await {
                        tracing::warn!(%error, "inbound message handling failed");
                    }
                }
            });
            *self.pump.lock() = Some(task.abort_handle());
            Ok(())
        })
    }

    fn off(&self) -> BoxFuture<'_, Result<()>> {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        Box::pin(async { Ok(()) })
    }
}
