//! Stream transport - length-prefixed frames over any byte stream.
//!
//! Frames are a 4-byte big-endian length prefix followed by the
//! codec-encoded envelope. A [`FrameBuffer`] accumulates partial reads on
//! the inbound side, so the transport works over pipes, sockets, or
//! anything else that fragments writes.
//!
//! Outbound frames go through a dedicated writer task fed by a channel, so
//! `post` never blocks on the peer and concurrent posters cannot interleave
//! partial frames.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::{MessageHandler, Transport};
use crate::codec::{Codec, JsonCodec};
use crate::error::{Result, RpcError};
use crate::handler::BoxFuture;

/// Length prefix size in bytes.
const LEN_PREFIX_SIZE: usize = 4;

/// Default maximum frame size (64 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Read buffer size for the inbound pump.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame buffer with a custom frame size limit.
    pub fn with_max_frame(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_BUF_SIZE),
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when a frame announces a length above the
    /// configured limit.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.buffer.len() < LEN_PREFIX_SIZE {
                break;
            }
            let mut prefix = [0u8; LEN_PREFIX_SIZE];
            prefix.copy_from_slice(&self.buffer[..LEN_PREFIX_SIZE]);
            let len = u32::from_be_bytes(prefix);
            if len > self.max_frame_size {
                return Err(RpcError::Protocol(format!(
                    "frame of {len} bytes exceeds limit of {}",
                    self.max_frame_size
                )));
            }
            if self.buffer.len() < LEN_PREFIX_SIZE + len as usize {
                break;
            }
            self.buffer.advance(LEN_PREFIX_SIZE);
            frames.push(self.buffer.split_to(len as usize).freeze());
        }
        Ok(frames)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport speaking length-prefixed frames over a read/write stream pair.
///
/// The codec type parameter selects the byte encoding; see
/// [`crate::codec`].
pub struct StreamTransport<R, C = JsonCodec> {
    writer_tx: mpsc::UnboundedSender<Vec<u8>>,
    writer_task: AbortHandle,
    reader: Mutex<Option<R>>,
    pump: Mutex<Option<AbortHandle>>,
    max_frame_size: u32,
    _codec: PhantomData<fn() -> C>,
}

impl<R, C> StreamTransport<R, C>
where
    R: AsyncRead + Unpin + Send + 'static,
    C: Codec,
{
    /// Create a transport over a read half and a write half.
    ///
    /// Spawns the writer task immediately; must be called from within a
    /// tokio runtime.
    pub fn new<W>(reader: R, writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_loop(writer_rx, writer));
        Arc::new(Self {
            writer_tx,
            writer_task: writer_task.abort_handle(),
            reader: Mutex::new(Some(reader)),
            pump: Mutex::new(None),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            _codec: PhantomData,
        })
    }
}

impl<R, C> Transport for StreamTransport<R, C>
where
    R: AsyncRead + Unpin + Send + 'static,
    C: Codec,
{
    fn post(&self, data: Value) -> BoxFuture<'_, Result<()>> {
        let sent = C::encode(&data).and_then(|frame| {
            if frame.len() > self.max_frame_size as usize {
                return Err(RpcError::Protocol(format!(
                    "outbound frame of {} bytes exceeds limit of {}",
                    frame.len(),
                    self.max_frame_size
                )));
            }
            self.writer_tx
                .send(frame)
                .map_err(|_| RpcError::Transport("stream writer closed".into()))
        });
        Box::pin(async move { sent })
    }

    fn on(&self, handler: MessageHandler) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let Some(mut reader) = self.reader.lock().take() else {
                return Err(RpcError::Transport(
                    "inbound handler already registered".into(),
                ));
            };
            let max_frame_size = self.max_frame_size;
            let task = tokio::spawn(async move {
                let mut frame_buffer = FrameBuffer::with_max_frame(max_frame_size);
                let mut buf = vec![0u8; READ_BUF_SIZE];
                loop {
                    let n = match reader.read(&mut buf).await {
                        Ok(0) => {
                            tracing::debug!("stream closed by peer");
                            return;
                        }
                        Ok(n) => n,
                        Err(error) => {
                            tracing::warn!(%error, "stream read failed");
                            return;
                        }
                    };
                    let frames = match frame_buffer.push(&buf[..n]) {
                        Ok(frames) => frames,
                        Err(error) => {
                            tracing::error!(%error, "stream framing violated, dropping connection");
                            return;
                        }
                    };
                    for frame in frames {
                        let value = match C::decode(&frame) {
                            Ok(value) => value,
                            Err(error) => {
                                tracing::warn!(%error, "dropping undecodable frame");
                                continue;
                            }
                        };
                        if let Err(error) = handler(value).await {
                            tracing::warn!(%error, "inbound message handling failed");
                        }
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

impl<R, C> Drop for StreamTransport<R, C> {
    fn drop(&mut self) {
        self.writer_task.abort();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

/// Writer task: drains the frame channel onto the stream.
async fn write_loop<W>(mut rx: mpsc::UnboundedReceiver<Vec<u8>>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        writer.write_all(&(frame.len() as u32).to_be_bytes()).await?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}
