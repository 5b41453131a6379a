//! # Protocol Messages
//!
//! The fixed message-kind union spoken with the host. Every frame on the stream
//! is a `StreamingMessage`: a request id that correlates responses with the
//! request that caused them, plus exactly one `Content` variant.
//!
//! Field names follow the host's camelCase JSON mapping.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::typed::TypedData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingMessage {
    #[serde(default)]
    pub request_id: String,
    pub content: Content,
}

impl StreamingMessage {
    pub fn new(request_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Content {
    StartStream(StartStream),
    WorkerInitRequest(WorkerInitRequest),
    WorkerInitResponse(WorkerInitResponse),
    WorkerHeartbeat(WorkerHeartbeat),
    WorkerTerminate(WorkerTerminate),
    WorkerStatusRequest(WorkerStatusRequest),
    FileChangeEventRequest(FileChangeEventRequest),
    FunctionLoadRequest(FunctionLoadRequest),
    FunctionLoadResponse(FunctionLoadResponse),
    InvocationRequest(InvocationRequest),
    InvocationResponse(InvocationResponse),
    InvocationCancel(InvocationCancel),
    FunctionEnvironmentReloadRequest(FunctionEnvironmentReloadRequest),
    FunctionEnvironmentReloadResponse(FunctionEnvironmentReloadResponse),
    RpcLog(RpcLog),
}

impl Content {
    /// Variant name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartStream(_) => "StartStream",
            Self::WorkerInitRequest(_) => "WorkerInitRequest",
            Self::WorkerInitResponse(_) => "WorkerInitResponse",
            Self::WorkerHeartbeat(_) => "WorkerHeartbeat",
            Self::WorkerTerminate(_) => "WorkerTerminate",
            Self::WorkerStatusRequest(_) => "WorkerStatusRequest",
            Self::FileChangeEventRequest(_) => "FileChangeEventRequest",
            Self::FunctionLoadRequest(_) => "FunctionLoadRequest",
            Self::FunctionLoadResponse(_) => "FunctionLoadResponse",
            Self::InvocationRequest(_) => "InvocationRequest",
            Self::InvocationResponse(_) => "InvocationResponse",
            Self::InvocationCancel(_) => "InvocationCancel",
            Self::FunctionEnvironmentReloadRequest(_) => "FunctionEnvironmentReloadRequest",
            Self::FunctionEnvironmentReloadResponse(_) => "FunctionEnvironmentReloadResponse",
            Self::RpcLog(_) => "RpcLog",
        }
    }
}

crate::macros::content_from!(
    StartStream,
    WorkerInitRequest,
    WorkerInitResponse,
    WorkerHeartbeat,
    WorkerTerminate,
    WorkerStatusRequest,
    FileChangeEventRequest,
    FunctionLoadRequest,
    FunctionLoadResponse,
    InvocationRequest,
    InvocationResponse,
    InvocationCancel,
    FunctionEnvironmentReloadRequest,
    FunctionEnvironmentReloadResponse,
    RpcLog,
);

// --- Lifecycle ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartStream {
    pub worker_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerInitRequest {
    pub host_version: String,
    pub capabilities: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInitResponse {
    #[serde(default)]
    pub worker_version: String,
    #[serde(default)]
    pub capabilities: HashMap<String, String>,
    pub result: StatusResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerHeartbeat {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerTerminate {
    pub grace_period_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatusRequest {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileChangeEventRequest {
    pub full_path: String,
    pub name: String,
}

// --- Function loading ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionLoadRequest {
    pub function_id: String,
    pub metadata: Option<RpcFunctionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLoadResponse {
    #[serde(default)]
    pub function_id: String,
    pub result: StatusResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcFunctionMetadata {
    pub name: String,
    pub directory: String,
    pub script_file: String,
    pub entry_point: String,
    pub bindings: HashMap<String, BindingInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindingInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub direction: Direction,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    In,
    Out,
    Inout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Undefined,
    String,
    Binary,
    Stream,
}

// --- Invocation ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationRequest {
    pub invocation_id: String,
    pub function_id: String,
    pub input_data: Vec<ParameterBinding>,
    pub trigger_metadata: HashMap<String, TypedData>,
}

/// A named binding payload. `data` is `None` when the host sent an empty union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterBinding {
    pub name: String,
    pub data: Option<TypedData>,
}

impl ParameterBinding {
    pub fn new(name: impl Into<String>, data: TypedData) -> Self {
        Self {
            name: name.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    #[serde(default)]
    pub invocation_id: String,
    #[serde(default)]
    pub output_data: Vec<ParameterBinding>,
    #[serde(default)]
    pub return_value: Option<TypedData>,
    pub result: StatusResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationCancel {
    pub invocation_id: String,
    pub grace_period_secs: u64,
}

// --- Environment ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionEnvironmentReloadRequest {
    pub environment_variables: HashMap<String, String>,
    pub function_app_directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEnvironmentReloadResponse {
    pub result: StatusResult,
}

// --- Status and logs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Failure,
    Success,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub status: Status,
    #[serde(default)]
    pub exception: Option<RpcException>,
}

impl StatusResult {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            exception: None,
        }
    }

    pub fn failure(message: impl Into<String>, stack_trace: Option<String>) -> Self {
        Self {
            status: Status::Failure,
            exception: Some(RpcException {
                message: message.into(),
                stack_trace: stack_trace.unwrap_or_default(),
                ..RpcException::default()
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcException {
    pub source: String,
    pub stack_trace: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
    #[default]
    User,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcLog {
    pub invocation_id: String,
    pub category: String,
    pub level: Level,
    pub message: String,
    pub event_id: String,
    pub log_category: LogCategory,
}
