//! In-memory event stream.
//!
//! `MemoryStream::pair` returns the worker end and a `HostHandle` that plays the
//! host: whatever the handle sends arrives on the worker's `recv`, and whatever
//! the worker sends is read back from the handle.

use std::sync::Arc;

use azpack::message::StreamingMessage;
use tokio::sync::mpsc;

use crate::stream;
use crate::stream::EventStream;
use crate::stream::Outbox;
use crate::stream::Sender;

pub struct MemoryStream {
    inbound: mpsc::UnboundedReceiver<StreamingMessage>,
    outbox: Outbox,
    started: bool,
}

impl MemoryStream {
    /// A worker end and a host end, connected to each other.
    pub fn pair() -> (Self, HostHandle) {
        let (to_worker, inbound) = mpsc::unbounded_channel();
        let (outbox, from_worker) = Outbox::channel();

        let stream = Self {
            inbound,
            outbox,
            started: false,
        };
        let host = HostHandle {
            to_worker: Some(to_worker),
            from_worker,
        };
        (stream, host)
    }
}

#[async_trait::async_trait]
impl EventStream for MemoryStream {
    async fn start(&mut self) -> stream::Result<()> {
        if self.started {
            return Err(stream::Error::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    fn sender(&self) -> Arc<dyn Sender> {
        Arc::new(self.outbox.clone())
    }

    async fn recv(&mut self) -> Option<StreamingMessage> {
        self.inbound.recv().await
    }

    async fn stop(&mut self) {
        self.inbound.close();
    }
}

/// The host side of a `MemoryStream`.
pub struct HostHandle {
    to_worker: Option<mpsc::UnboundedSender<StreamingMessage>>,
    from_worker: mpsc::UnboundedReceiver<StreamingMessage>,
}

impl HostHandle {
    /// Queues a message for the worker. Returns false once the input is closed
    /// or the worker has stopped.
    pub fn send(&self, msg: StreamingMessage) -> bool {
        match &self.to_worker {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// The next message from the worker, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<StreamingMessage> {
        self.from_worker.recv().await
    }

    /// Ends the worker's input; its `recv` returns `None` after the queue drains.
    pub fn close_input(&mut self) {
        self.to_worker = None;
    }
}
