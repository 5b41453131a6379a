//! # Protocol Channel
//!
//! One handler per inbound request kind. Each handled request produces exactly
//! one response carrying the request's id; failures become a failure status on
//! that response and never escape the channel.
//!
//! | Request                          | Response                            |
//! |----------------------------------|-------------------------------------|
//! | WorkerInitRequest                | WorkerInitResponse                  |
//! | FunctionLoadRequest              | FunctionLoadResponse                |
//! | InvocationRequest                | InvocationResponse                  |
//! | FunctionEnvironmentReloadRequest | FunctionEnvironmentReloadResponse   |
//!
//! Everything else is accepted and ignored.

use std::fmt;
use std::sync::Arc;

use azpack::TypedData;
use azpack::message::Content;
use azpack::message::FunctionEnvironmentReloadRequest;
use azpack::message::FunctionEnvironmentReloadResponse;
use azpack::message::FunctionLoadRequest;
use azpack::message::FunctionLoadResponse;
use azpack::message::InvocationRequest;
use azpack::message::InvocationResponse;
use azpack::message::LogCategory;
use azpack::message::ParameterBinding;
use azpack::message::StatusResult;
use azpack::message::StreamingMessage;
use azpack::message::WorkerInitRequest;
use azpack::message::WorkerInitResponse;

use crate::api::Context;
use crate::capabilities::capabilities;
use crate::function_info::RETURN_BINDING;
use crate::loader;
use crate::loader::Registry;
use crate::logger::Logger;
use crate::object;
use crate::stream::Sender;

/// Why an invocation failed.
#[derive(Debug)]
pub enum Error {
    Registry(loader::Error),
    Binding(object::Error),
}

impl Error {
    pub fn stack_trace(&self) -> Option<String> {
        match self {
            Self::Registry(e) => e.stack_trace(),
            Self::Binding(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "{}", e),
            Self::Binding(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<loader::Error> for Error {
    fn from(e: loader::Error) -> Self {
        Self::Registry(e)
    }
}

impl From<object::Error> for Error {
    fn from(e: object::Error) -> Self {
        Self::Binding(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct Channel {
    sender: Arc<dyn Sender>,
    registry: Arc<Registry>,
    logger: Logger,
}

impl Channel {
    pub fn new(sender: Arc<dyn Sender>, registry: Arc<Registry>) -> Self {
        let logger = Logger::new(sender.clone(), LogCategory::System);
        Self { sender, registry, logger }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatches one inbound message.
    pub fn handle(&self, msg: StreamingMessage) {
        let StreamingMessage { request_id, content } = msg;
        match content {
            Content::WorkerInitRequest(req) => self.init(&request_id, req),
            Content::FunctionLoadRequest(req) => self.function_load(&request_id, req),
            Content::InvocationRequest(req) => self.invocation(&request_id, req),
            Content::FunctionEnvironmentReloadRequest(req) => self.environment_reload(&request_id, req),
            Content::WorkerTerminate(req) => {
                tracing::info!(request_id, grace_period_secs = req.grace_period_secs, "terminate requested")
            }
            other => tracing::debug!(request_id, kind = other.kind(), "ignoring message"),
        }
    }

    pub fn init(&self, request_id: &str, req: WorkerInitRequest) {
        tracing::info!(request_id, host_version = %req.host_version, "worker init");
        let response = WorkerInitResponse {
            worker_version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: capabilities(),
            result: StatusResult::success(),
        };
        self.send(request_id, response);
    }

    pub fn function_load(&self, request_id: &str, req: FunctionLoadRequest) {
        let function_id = req.function_id;
        let result = match &req.metadata {
            _ if function_id.is_empty() => {
                StatusResult::failure("function load request without a function id", None)
            }
            None => StatusResult::failure(
                format!("function load request for {} carries no metadata", function_id),
                None,
            ),
            Some(metadata) => match self.registry.load(&function_id, metadata, &self.logger) {
                Ok(function) => {
                    tracing::info!(
                        function_id = %function_id,
                        name = %function.info.name,
                        ty = function.object_type.type_name(),
                        "function loaded"
                    );
                    StatusResult::success()
                }
                Err(e) => {
                    self.logger.error(format!("failed to load function {}: {}", function_id, e));
                    StatusResult::failure(e.to_string(), e.stack_trace())
                }
            },
        };
        self.send(request_id, FunctionLoadResponse { function_id, result });
    }

    pub fn invocation(&self, request_id: &str, req: InvocationRequest) {
        let response = match self.invoke(&req) {
            Ok((output_data, return_value)) => InvocationResponse {
                invocation_id: req.invocation_id,
                output_data,
                return_value,
                result: StatusResult::success(),
            },
            Err(e) => {
                tracing::warn!(
                    invocation_id = %req.invocation_id,
                    function_id = %req.function_id,
                    error = %e,
                    "invocation failed"
                );
                InvocationResponse {
                    invocation_id: req.invocation_id,
                    output_data: Vec::new(),
                    return_value: None,
                    result: StatusResult::failure(e.to_string(), e.stack_trace()),
                }
            }
        };
        self.send(request_id, response);
    }

    fn invoke(&self, req: &InvocationRequest) -> Result<(Vec<ParameterBinding>, Option<TypedData>)> {
        let function = self.registry.get(&req.function_id)?;
        let trigger_name = function.info.trigger_name();

        let mut trigger = None;
        let mut inputs = Vec::with_capacity(req.input_data.len());
        for binding in &req.input_data {
            if trigger.is_none() && Some(binding.name.as_str()) == trigger_name {
                trigger = binding.data.as_ref();
            } else {
                inputs.push(binding.clone());
            }
        }

        let logger = self.logger.for_invocation(&req.invocation_id);
        let ctx = Context::new(req.invocation_id.as_str(), req.function_id.as_str());
        let mut object = function.object_type.instantiate();
        object.call(ctx, &logger, trigger, &req.trigger_metadata, &inputs)?;

        let return_value = object.return_value()?;
        let mut names: Vec<&String> = function
            .info
            .outputs
            .keys()
            .filter(|name| name.as_str() != RETURN_BINDING)
            .collect();
        names.sort();
        let mut output_data = Vec::new();
        for name in names {
            if let Some(data) = object.output(name)? {
                output_data.push(ParameterBinding::new(name.as_str(), data));
            }
        }
        Ok((output_data, return_value))
    }

    /// Applies every valid variable, then changes directory. A failure in
    /// either step is reported but does not undo earlier steps.
    pub fn environment_reload(&self, request_id: &str, req: FunctionEnvironmentReloadRequest) {
        let mut problems = Vec::new();
        for (key, value) in &req.environment_variables {
            if key.is_empty() || key.contains(['=', '\0']) || value.contains('\0') {
                problems.push(format!("invalid environment variable {:?}", key));
                continue;
            }
            // SAFETY: the worker drains in-flight invocations before handing
            // a reload to the channel, so no user code runs concurrently.
            unsafe { std::env::set_var(key, value) };
        }

        let dir = &req.function_app_directory;
        if !dir.is_empty() {
            if let Err(e) = std::env::set_current_dir(dir) {
                problems.push(format!("failed to change directory to {}: {}", dir, e));
            }
        }

        let result = if problems.is_empty() {
            tracing::info!(request_id, variables = req.environment_variables.len(), "environment reloaded");
            StatusResult::success()
        } else {
            let message = problems.join("; ");
            self.logger.error(&message);
            StatusResult::failure(message, None)
        };
        self.send(request_id, FunctionEnvironmentReloadResponse { result });
    }

    fn send(&self, request_id: &str, content: impl Into<Content>) {
        self.sender.send(StreamingMessage::new(request_id, content));
    }
}
