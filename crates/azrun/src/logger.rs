//! Host-visible logging.
//!
//! Every record goes to `tracing` and, when the logger is attached to a stream,
//! to the host as an `RpcLog` message.

use std::backtrace::Backtrace;
use std::sync::Arc;

use azpack::message::Level;
use azpack::message::LogCategory;
use azpack::message::RpcLog;
use azpack::message::StreamingMessage;

use crate::stream::Sender;

#[derive(Clone)]
pub struct Logger {
    sink: Option<Arc<dyn Sender>>,
    category: LogCategory,
    invocation_id: String,
    event_id: String,
}

impl Logger {
    pub fn new(sink: Arc<dyn Sender>, category: LogCategory) -> Self {
        Self {
            sink: Some(sink),
            category,
            invocation_id: String::new(),
            event_id: String::new(),
        }
    }

    /// A logger that only writes to `tracing`.
    pub fn local() -> Self {
        Self {
            sink: None,
            category: LogCategory::System,
            invocation_id: String::new(),
            event_id: String::new(),
        }
    }

    /// A user-category logger scoped to one invocation.
    pub fn for_invocation(&self, invocation_id: &str) -> Self {
        Self {
            sink: self.sink.clone(),
            category: LogCategory::User,
            invocation_id: invocation_id.to_string(),
            event_id: String::new(),
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn category(&self) -> LogCategory {
        self.category
    }

    /// Trace records carry the caller's backtrace.
    pub fn trace(&self, message: impl AsRef<str>) {
        let message = format!("{}\n{}", message.as_ref(), Backtrace::force_capture());
        self.log(Level::Trace, &message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Information, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(Level::Critical, message.as_ref());
    }

    pub fn log(&self, level: Level, message: &str) {
        let invocation_id = self.invocation_id.as_str();
        match level {
            Level::Trace => tracing::trace!(invocation_id, "{}", message),
            Level::Debug => tracing::debug!(invocation_id, "{}", message),
            Level::Information => tracing::info!(invocation_id, "{}", message),
            Level::Warning => tracing::warn!(invocation_id, "{}", message),
            Level::Error | Level::Critical => tracing::error!(invocation_id, "{}", message),
            Level::None => return,
        }

        if let Some(sink) = &self.sink {
            let log = RpcLog {
                invocation_id: self.invocation_id.clone(),
                category: category_name(self.category).to_string(),
                level,
                message: message.to_string(),
                event_id: self.event_id.clone(),
                log_category: self.category,
            };
            sink.send(StreamingMessage::new(String::new(), log));
        }
    }
}

fn category_name(category: LogCategory) -> &'static str {
    match category {
        LogCategory::User => "User",
        LogCategory::System => "System",
    }
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
