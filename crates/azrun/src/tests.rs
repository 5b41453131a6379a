use std::collections::HashMap;

use azpack::HttpMessage;
use azpack::Marshal;
use azpack::TypedData;
use azpack::Unmarshal;
use azpack::Value;
use azpack::message::Direction;
use azpack::message::ParameterBinding;

use crate::api::canonical_header_key;
use crate::field::FieldCache;
use crate::function_info::Binding;
use crate::function_info::HTTP_OUTPUT;
use crate::function_info::HTTP_TRIGGER;
use crate::object;
use crate::object::ObjectKind;
use crate::object::ObjectType;
use crate::*;

fn http_trigger() -> Binding {
    Binding::new("req", HTTP_TRIGGER, Direction::In)
}

fn request(body: &str) -> TypedData {
    HttpMessage {
        method: "POST".into(),
        url: "http://localhost/api/echo".into(),
        body: Some(TypedData::String(body.into())),
        ..HttpMessage::default()
    }
    .into()
}

fn object_type(descriptor: TypeDescriptor, inputs: &[Binding], outputs: &[Binding]) -> ObjectType {
    ObjectType::new(&descriptor, Some(&http_trigger()), inputs, outputs, &FieldCache::new())
        .expect("object type should build")
}

fn call<'t>(ty: &'t ObjectType, trigger: TypedData, inputs: &[ParameterBinding]) -> object::Result<object::Object<'t>> {
    let mut object = ty.instantiate();
    object.call(Context::new("inv-1", "fn-1"), &Logger::local(), Some(&trigger), &HashMap::new(), inputs)?;
    Ok(object)
}

// ============================================================================
//  HTTP TYPES
// ============================================================================

#[test]
fn test_canonical_header_key() {
    assert_eq!(canonical_header_key("content-type"), "Content-Type");
    assert_eq!(canonical_header_key("X-FORWARDED-FOR"), "X-Forwarded-For");
    assert_eq!(canonical_header_key("bad key"), "bad key");
}

#[test]
fn test_request_from_http() -> azpack::Result<()> {
    let mut msg = HttpMessage {
        method: "GET".into(),
        body: Some(TypedData::Json(r#"{"a":1}"#.into())),
        ..HttpMessage::default()
    };
    msg.headers.insert("content-type".into(), "application/json".into());

    let mut req = Request::default();
    req.unmarshal(&TypedData::from(msg))?;
    assert_eq!(req.method, "GET");
    assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    assert_eq!(req.body, Value::Json(serde_json::json!({"a": 1})));
    assert_eq!(req.raw_body, req.body);

    assert!(req.unmarshal(&TypedData::String("nope".into())).is_err());
    Ok(())
}

#[test]
fn test_response_default_status() -> azpack::Result<()> {
    let Some(TypedData::Http(msg)) = Response::default().with_body("ok").marshal()? else {
        panic!("response should marshal to http");
    };
    assert_eq!(msg.status_code, "200");
    assert_eq!(msg.body, Some(TypedData::String("ok".into())));

    let Some(TypedData::Http(msg)) = Response::new(404).with_header("x-id", "7").marshal()? else {
        panic!("response should marshal to http");
    };
    assert_eq!(msg.status_code, "404");
    assert_eq!(msg.headers.get("X-Id").map(String::as_str), Some("7"));
    assert_eq!(msg.body, None);
    Ok(())
}

// ============================================================================
//  OBJECTS
// ============================================================================

#[derive(Default, Record)]
struct Echo {
    pub http_trigger: Request,
    pub message: String,
    #[binding("res")]
    pub out: String,
    #[binding(omit_empty)]
    pub note: String,
    #[binding(string)]
    pub size: i64,
}

impl Function for Echo {
    fn run(&mut self, ctx: &Context, logger: &Logger) {
        logger.info(format!("echo {}", ctx.invocation_id()));
        let body = self.http_trigger.body.as_str().unwrap_or_default();
        self.out = format!("{}:{}", self.message, body);
        self.size = self.out.len() as i64;
    }
}

#[test]
fn test_struct_binding_and_http_wrap() -> object::Result<()> {
    let ty = object_type(
        TypeDescriptor::function::<Echo>(),
        &[Binding::new("message", "queue", Direction::In)],
        &[
            Binding::new("res", HTTP_OUTPUT, Direction::Out),
            Binding::new("note", "queue", Direction::Out),
            Binding::new("size", "queue", Direction::Out),
            Binding::new("missing", "queue", Direction::Out),
        ],
    );
    assert_eq!(ty.kind(), ObjectKind::Struct);
    assert!(ty.binds_trigger());
    assert!(ty.is_http_output("res"));
    assert!(ty.is_http_output("$return"));
    assert!(!ty.binds_output("missing"));

    let object = call(
        &ty,
        request("body"),
        &[ParameterBinding::new("message", TypedData::String("hi".into()))],
    )?;

    let Some(TypedData::Http(res)) = object.output("res")? else {
        panic!("res should be wrapped as http");
    };
    assert_eq!(res.status_code, "200");
    assert_eq!(res.body, Some(TypedData::String("hi:body".into())));

    assert_eq!(object.output("note")?, None);
    assert_eq!(object.output("size")?, Some(TypedData::String("7".into())));
    assert_eq!(object.output("missing")?, None);
    assert_eq!(object.return_value()?, None);
    Ok(())
}

#[test]
fn test_missing_trigger_and_single_use() -> object::Result<()> {
    let ty = object_type(TypeDescriptor::function::<Echo>(), &[], &[]);

    let mut object = ty.instantiate();
    let err = object.call(Context::new("i", "f"), &Logger::local(), None, &HashMap::new(), &[]);
    assert_eq!(err, Err(object::Error::MissingTriggerData));

    let trigger = request("x");
    object.call(Context::new("i", "f"), &Logger::local(), Some(&trigger), &HashMap::new(), &[])?;
    let again = object.call(Context::new("i", "f"), &Logger::local(), Some(&trigger), &HashMap::new(), &[]);
    assert_eq!(again, Err(object::Error::AlreadyExecuted));
    Ok(())
}

#[test]
fn test_first_input_error_aborts() {
    let ty = object_type(
        TypeDescriptor::function::<Echo>(),
        &[Binding::new("message", "queue", Direction::In)],
        &[],
    );
    let result = call(
        &ty,
        request("x"),
        &[ParameterBinding::new("message", TypedData::Bytes(vec![0xff, 0xfe]))],
    );
    assert!(matches!(
        result.err(),
        Some(object::Error::Binding { ref name, source: azpack::Error::InvalidUtf8 }) if name == "message"
    ));
}

#[derive(Default, Record)]
struct Greeter {
    pub http_trigger: Request,
}

impl ReturnFunction for Greeter {
    type Output = String;

    fn run(&mut self, ctx: &Context, _logger: &Logger) -> String {
        let who = ctx
            .trigger_metadata()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("nobody");
        format!("hello {}", who)
    }
}

#[test]
fn test_return_value_wrapped_for_http_trigger() -> object::Result<()> {
    let ty = object_type(TypeDescriptor::returning::<Greeter>(), &[], &[]);
    assert!(ty.has_return());

    let mut metadata = HashMap::new();
    metadata.insert("name".to_string(), TypedData::String("ada".into()));
    metadata.insert("broken".to_string(), TypedData::Json("{".into()));

    let mut object = ty.instantiate();
    object.call(Context::new("i", "f"), &Logger::local(), Some(&request("")), &metadata, &[])?;

    let Some(TypedData::Http(msg)) = object.return_value()? else {
        panic!("return value should be wrapped as http");
    };
    assert_eq!(msg.status_code, "200");
    assert_eq!(msg.body, Some(TypedData::String("hello ada".into())));
    Ok(())
}

#[derive(Default)]
struct Upper {
    bindings: BindingMap,
}

impl MapObject for Upper {
    fn bindings(&self) -> &BindingMap {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut BindingMap {
        &mut self.bindings
    }
}

impl Function for Upper {
    fn run(&mut self, _ctx: &Context, _logger: &Logger) {
        let text = self.bindings.get("text").and_then(Value::as_str).unwrap_or_default().to_uppercase();
        self.bindings.insert("shout".into(), Value::from(text));
    }
}

#[test]
fn test_map_object() -> object::Result<()> {
    let ty = object_type(
        TypeDescriptor::map_function::<Upper>(),
        &[Binding::new("text", "queue", Direction::In)],
        &[
            Binding::new("shout", "queue", Direction::Out),
            Binding::new("silent", "queue", Direction::Out),
        ],
    );
    assert_eq!(ty.kind(), ObjectKind::Map);

    let object = call(
        &ty,
        request(""),
        &[ParameterBinding::new("text", TypedData::String("quiet".into()))],
    )?;
    assert_eq!(object.output("shout")?, Some(TypedData::String("QUIET".into())));
    assert_eq!(object.output("silent")?, None);
    Ok(())
}

#[derive(Default, Record)]
struct Faulty {
    pub http_trigger: Request,
}

impl Function for Faulty {
    fn run(&mut self, _ctx: &Context, _logger: &Logger) {
        panic!("boom");
    }
}

#[test]
fn test_panic_is_contained() {
    let ty = object_type(TypeDescriptor::function::<Faulty>(), &[], &[]);
    let result = call(&ty, request(""), &[]);
    assert_eq!(result.err(), Some(object::Error::Panicked("boom".into())));
}

/// A value whose encoding always panics.
#[derive(Default)]
struct Tripwire;

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

#[derive(Default, Record)]
struct Tripped {
    pub http_trigger: Request,
    pub alarm: Tripwire,
}

impl ReturnFunction for Tripped {
    type Output = Tripwire;

    fn run(&mut self, _ctx: &Context, _logger: &Logger) -> Tripwire {
        Tripwire
    }
}

#[test]
fn test_marshal_panic_is_contained() -> object::Result<()> {
    let ty = object_type(
        TypeDescriptor::returning::<Tripped>(),
        &[],
        &[Binding::new("alarm", "queue", Direction::Out)],
    );
    let object = call(&ty, request(""), &[])?;

    let expected = Err(object::Error::Panicked("tripwire marshaled".into()));
    assert_eq!(object.return_value(), expected);
    assert_eq!(object.output("alarm"), expected);
    Ok(())
}

#[test]
fn test_inert_type_rejected() {
    let result = ObjectType::new(
        &TypeDescriptor::inert::<String>(),
        Some(&http_trigger()),
        std::iter::empty(),
        std::iter::empty(),
        &FieldCache::new(),
    );
    assert!(matches!(result, Err(object::Error::UnsupportedFunctionType(_))));
}

// ============================================================================
//  LOADER
// ============================================================================

#[test]
fn test_static_loader_keys() {
    let loader = StaticLoader::new()
        .with("Echo", "", TypeDescriptor::function::<Echo>())
        .with("Greeter", "greet", TypeDescriptor::returning::<Greeter>());
    assert_eq!(loader.len(), 2);

    let mut meta = azpack::message::RpcFunctionMetadata {
        name: "Greeter".into(),
        entry_point: "greet".into(),
        ..Default::default()
    };
    let info = crate::function_info::FunctionInfo::from_metadata(&meta).expect("metadata");
    let found = loader.function_type(&info, &Logger::local()).expect("registered");
    assert_eq!(found.type_name(), std::any::type_name::<Greeter>());

    meta.entry_point = "Other".into();
    let info = crate::function_info::FunctionInfo::from_metadata(&meta).expect("metadata");
    assert!(loader.function_type(&info, &Logger::local()).is_err());
}
