//! # Azrun
//!
//! An out-of-process function worker. It holds a bidirectional message stream
//! to a serverless host, loads function metadata, binds wire values onto user
//! function objects, runs them, and reports results back on the same stream.
//!
//! ## Architecture
//!
//! ```text
//! EventStream ──► Worker ──► Channel ──► Registry ──► ObjectType ──► Object
//!      ▲                       │            │              │
//!      └──── Sender ◄──────────┘       TypeLoader      FieldCache
//! ```
//!
//! - `field`: which struct field answers to which binding name.
//! - `object`: per-function binding plan (`ObjectType`) and per-invocation
//!   instance (`Object`).
//! - `loader`: function metadata to `ObjectType`, keyed by function id.
//! - `channel`: one handler per request kind, one correlated response each.
//! - `worker`: stream lifecycle and the dispatch loop.

pub mod api;
pub mod capabilities;
pub mod channel;
pub mod config;
pub mod field;
pub mod function_info;
pub mod loader;
pub mod logger;
pub mod memory_stream;
pub mod object;
pub mod stream;
pub mod tcp_stream;
pub mod worker;

#[cfg(test)]
mod tests;

pub use api::Context;
pub use api::Function;
pub use api::Request;
pub use api::Response;
pub use api::ReturnFunction;
pub use api::TriggerMetadata;
pub use azpack::Record;
pub use config::WorkerConfig;
pub use loader::StaticLoader;
pub use loader::TypeLoader;
pub use logger::Logger;
pub use object::BindingMap;
pub use object::MapObject;
pub use object::TypeDescriptor;
pub use worker::Worker;
pub use worker::serve;
