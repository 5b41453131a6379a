//! # TCP Event Stream
//!
//! The host connection. Each message travels as one frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (BE)  | StreamingMessage as JSON  |
//! +----------------+---------------------------+
//! ```
//!
//! A reader task decodes inbound frames into a queue drained by `recv`; a writer
//! task drains the `Outbox`. Frames larger than the configured maximum are
//! refused in both directions.
//!
//! ## Invariants
//! - **Clean End**: EOF on a frame boundary, a malformed frame or an oversized
//!   frame all end the inbound queue; `recv` then returns `None`.
//! - **Shared Fate**: A failed write aborts the reader, so the worker stops
//!   taking work it can no longer answer.
//! - **Flush on Stop**: `stop` lets the writer send what is already queued,
//!   for up to `DRAIN_TIMEOUT`, before the connection is dropped.
//! - **No Partial Writes Visible**: Outbound frames are written with a single
//!   `write_all` of header and body.

use std::sync::Arc;
use std::time::Duration;

use azpack::message::StreamingMessage;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::stream;
use crate::stream::EventStream;
use crate::stream::Outbox;
use crate::stream::Sender;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TcpEventStream {
    address: String,
    max_message_length: usize,
    outbox: Outbox,
    outbound: Option<mpsc::UnboundedReceiver<StreamingMessage>>,
    pumps: Option<Pumps>,
}

impl TcpEventStream {
    pub fn new(address: impl Into<String>, max_message_length: usize) -> Self {
        let (outbox, outbound) = Outbox::channel();
        Self {
            address: address.into(),
            max_message_length,
            outbox,
            outbound: Some(outbound),
            pumps: None,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.address(), config.max_message_length)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait::async_trait]
impl EventStream for TcpEventStream {
    async fn start(&mut self) -> stream::Result<()> {
        let outbound = self.outbound.take().ok_or(stream::Error::AlreadyStarted)?;

        let socket = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| stream::Error::Timeout)?
            .map_err(|e| stream::Error::Connect(format!("{}: {}", self.address, e)))?;
        socket.set_nodelay(true)?;
        tracing::info!(address = %self.address, "connected to host");

        let (read_half, write_half) = socket.into_split();
        self.pumps = Some(Pumps::spawn(read_half, write_half, outbound, self.max_message_length));
        Ok(())
    }

    fn sender(&self) -> Arc<dyn Sender> {
        Arc::new(self.outbox.clone())
    }

    async fn recv(&mut self) -> Option<StreamingMessage> {
        self.pumps.as_mut()?.recv().await
    }

    async fn stop(&mut self) {
        if let Some(pumps) = self.pumps.take() {
            pumps.stop().await;
        }
        tracing::info!(address = %self.address, "stream stopped");
    }
}

// ============================================================================
//  PUMPS
// ============================================================================

/// The reader and writer tasks of one connection.
pub struct Pumps {
    inbound: mpsc::UnboundedReceiver<StreamingMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    drain: oneshot::Sender<()>,
}

impl Pumps {
    pub fn spawn<R, W>(
        read_half: R,
        write_half: W,
        outbound: mpsc::UnboundedReceiver<StreamingMessage>,
        limit: usize,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (drain, drain_rx) = oneshot::channel();
        let reader = tokio::spawn(read_loop(read_half, inbound_tx, limit));
        let writer = tokio::spawn(write_loop(write_half, outbound, drain_rx, reader.abort_handle(), limit));
        Self { inbound, reader, writer, drain }
    }

    /// The next decoded inbound message.
    pub async fn recv(&mut self) -> Option<StreamingMessage> {
        self.inbound.recv().await
    }

    /// Flushes queued outbound frames, then tears both tasks down.
    pub async fn stop(self) {
        let Self { inbound, reader, mut writer, drain } = self;
        reader.abort();
        drop(inbound);

        // A writer that already failed has dropped the receiver.
        let _ = drain.send(());
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await.is_err() {
            tracing::warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "outbound queue not drained; dropping it");
            writer.abort();
        }
    }
}

async fn read_loop<R>(mut reader: R, inbound: mpsc::UnboundedSender<StreamingMessage>, limit: usize)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader, limit).await {
            Ok(Some(msg)) => {
                if inbound.send(msg).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("host closed the stream");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read from host");
                break;
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<StreamingMessage>,
    mut drain: oneshot::Receiver<()>,
    reader: AbortHandle,
    limit: usize,
) where
    W: AsyncWrite + Unpin,
{
    let mut draining = false;
    loop {
        let next = tokio::select! {
            biased;
            msg = outbound.recv() => Some(msg),
            _ = &mut drain, if !draining => None,
        };
        let msg = match next {
            Some(Some(msg)) => msg,
            Some(None) => break,
            None => {
                // Already-queued messages are still delivered after `close`.
                draining = true;
                outbound.close();
                continue;
            }
        };

        match write_frame(&mut writer, &msg, limit).await {
            Ok(()) => {}
            Err(stream::Error::FrameTooLarge { size, limit }) => {
                tracing::error!(kind = msg.content.kind(), size, limit, "dropping oversized message");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to write to host; closing the stream");
                reader.abort();
                return;
            }
        }
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "failed to shut down the write half");
    }
}

/// Reads one frame. `Ok(None)` means the peer closed the stream between frames.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> stream::Result<Option<StreamingMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_be_bytes(header) as usize;
    if size > limit {
        return Err(stream::Error::FrameTooLarge { size, limit });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

pub async fn write_frame<W>(writer: &mut W, msg: &StreamingMessage, limit: usize) -> stream::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > limit || body.len() > u32::MAX as usize {
        return Err(stream::Error::FrameTooLarge { size: body.len(), limit });
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
