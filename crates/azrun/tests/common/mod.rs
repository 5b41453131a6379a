//! Fixtures shared by the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;

use azpack::HttpMessage;
use azpack::Marshal;
use azpack::TypedData;
use azpack::Unmarshal;
use azpack::message::BindingInfo;
use azpack::message::DataType;
use azpack::message::Direction;
use azpack::message::InvocationRequest;
use azpack::message::ParameterBinding;
use azpack::message::RpcFunctionMetadata;
use azrun::Context;
use azrun::Function;
use azrun::Logger;
use azrun::Record;
use azrun::Response;
use azrun::StaticLoader;
use azrun::TypeDescriptor;

pub const COPY_BLOB: &str = "CopyBlob";
pub const NOT_A_FUNCTION: &str = "Inert";
pub const BRITTLE: &str = "Brittle";

/// Copies the `original` blob to `copy` and answers the HTTP trigger.
#[derive(Default, Record)]
pub struct CopyBlob {
    #[binding("trigger")]
    pub req: azrun::Request,
    #[binding("original")]
    pub blob: Vec<u8>,
    /// Loses to the tagged field above for the `original` binding.
    pub original: Vec<u8>,
    pub string_data: String,
    #[binding("copy")]
    pub out_blob: Vec<u8>,
    #[binding("res")]
    pub res: Response,
    pub echo: String,
}

impl Function for CopyBlob {
    fn run(&mut self, ctx: &Context, logger: &Logger) {
        logger.info(format!("copying blob for {}", ctx.invocation_id()));
        let mut copy = self.blob.clone();
        copy.extend_from_slice(b"-mock-copy");
        self.out_blob = copy;
        self.echo = self.string_data.clone();
        self.res = Response::new(200).with_body("copied");
    }
}

pub struct Inert;

/// A blob that panics when encoded.
#[derive(Default)]
pub struct Tripwire;

impl Marshal for Tripwire {
    fn marshal(&self) -> azpack::Result<Option<TypedData>> {
        panic!("tripwire marshaled");
    }
}

impl Unmarshal for Tripwire {
    fn unmarshal(&mut self, _data: &TypedData) -> azpack::Result<()> {
        Ok(())
    }
}

/// Runs cleanly, then fails while its `copy` output is encoded.
#[derive(Default, Record)]
pub struct Brittle {
    #[binding("trigger")]
    pub req: azrun::Request,
    #[binding("copy")]
    pub copy: Tripwire,
}

impl Function for Brittle {
    fn run(&mut self, _ctx: &Context, _logger: &Logger) {}
}

pub fn loader() -> StaticLoader {
    StaticLoader::new()
        .with(COPY_BLOB, "", TypeDescriptor::function::<CopyBlob>())
        .with(NOT_A_FUNCTION, "", TypeDescriptor::inert::<Inert>())
        .with(BRITTLE, "", TypeDescriptor::function::<Brittle>())
}

fn binding(kind: &str, direction: Direction) -> BindingInfo {
    BindingInfo {
        kind: kind.to_string(),
        direction,
        data_type: DataType::Undefined,
    }
}

pub fn metadata(name: &str) -> RpcFunctionMetadata {
    let mut bindings = HashMap::new();
    bindings.insert("trigger".to_string(), binding("httpTrigger", Direction::In));
    bindings.insert("original".to_string(), binding("blob", Direction::In));
    bindings.insert("stringData".to_string(), binding("queue", Direction::In));
    bindings.insert("copy".to_string(), binding("blob", Direction::Out));
    bindings.insert("res".to_string(), binding("http", Direction::Out));
    bindings.insert("echo".to_string(), binding("queue", Direction::Out));
    RpcFunctionMetadata {
        name: name.to_string(),
        directory: "/home/site/wwwroot".to_string(),
        script_file: String::new(),
        entry_point: String::new(),
        bindings,
    }
}

pub fn trigger() -> TypedData {
    HttpMessage {
        method: "POST".into(),
        url: "http://localhost/api/copy".into(),
        ..HttpMessage::default()
    }
    .into()
}

pub fn invocation(invocation_id: &str, function_id: &str) -> InvocationRequest {
    InvocationRequest {
        invocation_id: invocation_id.to_string(),
        function_id: function_id.to_string(),
        input_data: vec![
            ParameterBinding::new("trigger", trigger()),
            ParameterBinding::new("original", TypedData::Bytes(b"mock-data".to_vec())),
            ParameterBinding::new("stringData", TypedData::String("hello".into())),
        ],
        trigger_metadata: HashMap::new(),
    }
}
