//! # Event Streams
//!
//! The worker's view of the transport: a source of inbound messages and a
//! synchronous sender for outbound ones.
//!
//! ## Philosophy
//!
//! - **Mailboxes**: Sending never blocks or fails at the call site. Messages
//!   land in an unbounded queue drained by the transport's writer task, so user
//!   code can log from inside a synchronous function.
//! - **End of Stream**: `recv` returning `None` ends the worker's main loop.
//!   There is no reconnection; restarting is the caller's job.

use std::fmt;
use std::sync::Arc;

use azpack::message::StreamingMessage;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The host could not be reached.
    Connect(String),
    /// Connecting took longer than the allowed window.
    Timeout,
    /// A frame exceeded the negotiated maximum message size.
    FrameTooLarge { size: usize, limit: usize },
    /// A frame was not a valid message.
    Codec(String),
    Io(String),
    /// `start` was called twice.
    AlreadyStarted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "Failed to connect: {}", msg),
            Self::Timeout => write!(f, "Connection timed out"),
            Self::FrameTooLarge { size, limit } => {
                write!(f, "Frame of {} bytes exceeds the {} byte limit", size, limit)
            }
            Self::Codec(msg) => write!(f, "Malformed frame: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::AlreadyStarted => write!(f, "Stream already started"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fire-and-forget outbound messages.
pub trait Sender: Send + Sync + 'static {
    fn send(&self, msg: StreamingMessage);
}

/// A bidirectional message stream to the host.
#[async_trait::async_trait]
pub trait EventStream: Send + 'static {
    /// Opens the underlying connection and starts the pump tasks.
    async fn start(&mut self) -> Result<()>;

    /// Shared handle for outbound messages. Valid before `start`; messages
    /// queue until the writer runs.
    fn sender(&self) -> Arc<dyn Sender>;

    /// The next inbound message, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<StreamingMessage>;

    /// Tears down the pump tasks and the connection.
    async fn stop(&mut self);
}

/// The outbound mailbox shared by every stream implementation.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<StreamingMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Sender for Outbox {
    fn send(&self, msg: StreamingMessage) {
        if let Err(rejected) = self.tx.send(msg) {
            tracing::debug!(kind = rejected.0.content.kind(), "stream closed; dropping message");
        }
    }
}
