//! # Worker
//!
//! Owns the event stream for its whole life: start it, announce the worker to
//! the host, feed every inbound message to the `Channel`, stop it.
//!
//! ## Dispatch
//!
//! Loads, environment reloads and init run inline on the dispatch loop, so
//! registry writes are serialized. Invocations run on the blocking pool and
//! answer whenever they finish; responses correlate by request id, not order.
//! An environment reload first waits for every in-flight invocation, so no
//! user code runs while the process environment changes. When the stream
//! ends, in-flight invocations are drained before `stop`.

use std::fmt;
use std::sync::Arc;

use azpack::message::Content;
use azpack::message::StartStream;
use azpack::message::StreamingMessage;
use tokio::task::JoinSet;

use crate::channel::Channel;
use crate::config::WorkerConfig;
use crate::loader::Registry;
use crate::loader::TypeLoader;
use crate::stream;
use crate::stream::EventStream;
use crate::tcp_stream::TcpEventStream;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    MissingWorkerId,
    MissingRequestId,
    Stream(stream::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWorkerId => write!(f, "worker id is required"),
            Self::MissingRequestId => write!(f, "request id is required"),
            Self::Stream(e) => write!(f, "event stream: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<stream::Error> for Error {
    fn from(e: stream::Error) -> Self {
        Self::Stream(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct Worker<S: EventStream> {
    worker_id: String,
    request_id: String,
    stream: S,
    registry: Arc<Registry>,
}

impl<S: EventStream> Worker<S> {
    pub fn new(
        worker_id: impl Into<String>,
        request_id: impl Into<String>,
        stream: S,
        loader: impl TypeLoader,
    ) -> Self {
        Self::with_registry(worker_id, request_id, stream, Arc::new(Registry::new(loader)))
    }

    /// A worker over an existing registry, e.g. one shared with a test.
    pub fn with_registry(
        worker_id: impl Into<String>,
        request_id: impl Into<String>,
        stream: S,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            request_id: request_id.into(),
            stream,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs until the stream ends.
    pub async fn listen(mut self) -> Result<()> {
        if self.worker_id.is_empty() {
            return Err(Error::MissingWorkerId);
        }
        if self.request_id.is_empty() {
            return Err(Error::MissingRequestId);
        }

        self.stream.start().await?;
        let sender = self.stream.sender();
        sender.send(StreamingMessage::new(
            self.request_id.as_str(),
            StartStream { worker_id: self.worker_id.clone() },
        ));
        tracing::info!(worker_id = %self.worker_id, "worker started");

        let channel = Arc::new(Channel::new(sender, self.registry.clone()));
        let mut in_flight = JoinSet::new();

        while let Some(msg) = self.stream.recv().await {
            match msg.content {
                Content::InvocationRequest(_) => {
                    let channel = channel.clone();
                    in_flight.spawn_blocking(move || channel.handle(msg));
                }
                Content::FunctionEnvironmentReloadRequest(_) => {
                    tracing::debug!(pending = in_flight.len(), "draining invocations before reload");
                    drain(&mut in_flight).await;
                    channel.handle(msg);
                }
                _ => channel.handle(msg),
            }

            while let Some(done) = in_flight.try_join_next() {
                reap(done);
            }
        }

        tracing::info!(pending = in_flight.len(), "stream ended; draining invocations");
        drain(&mut in_flight).await;

        self.stream.stop().await;
        tracing::info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(done) = in_flight.join_next().await {
        reap(done);
    }
}

fn reap(done: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!(error = %e, "invocation task failed");
    }
}

/// Connects to the host described by `config` and serves until the stream ends.
pub async fn serve(config: &WorkerConfig, loader: impl TypeLoader) -> anyhow::Result<()> {
    let stream = TcpEventStream::from_config(config);
    let worker = Worker::new(config.worker_id.as_str(), config.request_id.as_str(), stream, loader);
    worker.listen().await?;
    Ok(())
}
