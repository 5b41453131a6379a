//! # Binding Engine
//!
//! `ObjectType` is the compiled binding plan for one loaded function: which
//! field or map key receives the trigger and each input, which one produces each
//! output, and which outputs must be shaped as HTTP responses. `Object` is one
//! fresh instance of the function's type, used for exactly one invocation.
//!
//! ## Shapes
//!
//! A function type is described by a `TypeDescriptor`:
//!
//! - **Record**: a `#[derive(Record)]` struct. Bindings address fields through
//!   the `FieldCache`.
//! - **Map**: a type exposing a `BindingMap`. Every binding name is a key;
//!   inputs are stored decoded as `Value`s.
//!
//! Either shape runs through `Function` (outputs written into the instance) or
//! `ReturnFunction` (output returned as `$return`). A type with neither is
//! rejected when its `ObjectType` is built.
//!
//! ## Invariants
//! - **Single Use**: An `Object` executes at most once.
//! - **Contained Faults**: A panic in user code, in binding its inputs, or in
//!   marshaling its outputs is caught and returned as `Error::Panicked`.

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;

use azpack::FieldDecl;
use azpack::HttpMessage;
use azpack::Marshal;
use azpack::Record;
use azpack::Slot;
use azpack::TypedData;
use azpack::Unmarshal;
use azpack::Value;
use azpack::decode;
use azpack::message::ParameterBinding;
use azpack::unmarshal::format_double;

use crate::api::Context;
use crate::api::Function;
use crate::api::ReturnFunction;
use crate::api::TriggerMetadata;
use crate::field::Field;
use crate::field::FieldCache;
use crate::field::lookup;
use crate::function_info::Binding;
use crate::function_info::RETURN_BINDING;
use crate::logger::Logger;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The type has no execution capability.
    UnsupportedFunctionType(&'static str),
    /// The invocation carried no data for the trigger binding.
    MissingTriggerData,
    /// A binding's value could not be converted.
    Binding { name: String, source: azpack::Error },
    /// A resolved field path no longer addresses a slot.
    Unaddressable(String),
    /// User code panicked.
    Panicked(String),
    /// `call` was invoked on an object that already ran.
    AlreadyExecuted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFunctionType(ty) => {
                write!(f, "type {} implements neither Function nor ReturnFunction", ty)
            }
            Self::MissingTriggerData => write!(f, "missing trigger data"),
            Self::Binding { name, source } => write!(f, "binding {}: {}", name, source),
            Self::Unaddressable(name) => write!(f, "binding {} does not address a field", name),
            Self::Panicked(msg) => write!(f, "function panicked: {}", msg),
            Self::AlreadyExecuted => write!(f, "function object already executed"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// String-keyed binding storage for map-shaped functions.
pub type BindingMap = HashMap<String, Value>;

/// A function type whose bindings live in a `BindingMap`.
pub trait MapObject: Send + 'static {
    fn bindings(&self) -> &BindingMap;
    fn bindings_mut(&mut self) -> &mut BindingMap;
}

// --- Type-erased instances ---

type Returned = Box<dyn Marshal + Send>;

trait Instance: Send {
    fn slot(&self, _path: &[usize]) -> Option<&dyn Slot> {
        None
    }

    fn slot_mut(&mut self, _path: &[usize]) -> Option<&mut dyn Slot> {
        None
    }

    fn entries(&self) -> Option<&BindingMap> {
        None
    }

    fn entries_mut(&mut self) -> Option<&mut BindingMap> {
        None
    }

    fn execute(&mut self, ctx: &Context, logger: &Logger) -> Option<Returned>;
}

struct RecordRuns<T>(T);
struct RecordReturns<T>(T);
struct MapRuns<T>(T);
struct MapReturns<T>(T);

impl<T: Record + Function> Instance for RecordRuns<T> {
    fn slot(&self, path: &[usize]) -> Option<&dyn Slot> {
        self.0.slot(path)
    }

    fn slot_mut(&mut self, path: &[usize]) -> Option<&mut dyn Slot> {
        self.0.slot_mut(path)
    }

    fn execute(&mut self, ctx: &Context, logger: &Logger) -> Option<Returned> {
        self.0.run(ctx, logger);
        None
    }
}

impl<T: Record + ReturnFunction> Instance for RecordReturns<T> {
    fn slot(&self, path: &[usize]) -> Option<&dyn Slot> {
        self.0.slot(path)
    }

    fn slot_mut(&mut self, path: &[usize]) -> Option<&mut dyn Slot> {
        self.0.slot_mut(path)
    }

    fn execute(&mut self, ctx: &Context, logger: &Logger) -> Option<Returned> {
        Some(Box::new(self.0.run(ctx, logger)))
    }
}

impl<T: MapObject + Function> Instance for MapRuns<T> {
    fn entries(&self) -> Option<&BindingMap> {
        Some(self.0.bindings())
    }

    fn entries_mut(&mut self) -> Option<&mut BindingMap> {
        Some(self.0.bindings_mut())
    }

    fn execute(&mut self, ctx: &Context, logger: &Logger) -> Option<Returned> {
        self.0.run(ctx, logger);
        None
    }
}

impl<T: MapObject + ReturnFunction> Instance for MapReturns<T> {
    fn entries(&self) -> Option<&BindingMap> {
        Some(self.0.bindings())
    }

    fn entries_mut(&mut self) -> Option<&mut BindingMap> {
        Some(self.0.bindings_mut())
    }

    fn execute(&mut self, ctx: &Context, logger: &Logger) -> Option<Returned> {
        Some(Box::new(self.0.run(ctx, logger)))
    }
}

fn new_record_runs<T: Record + Function + Default>() -> Box<dyn Instance> {
    Box::new(RecordRuns(T::default()))
}

fn new_record_returns<T: Record + ReturnFunction + Default>() -> Box<dyn Instance> {
    Box::new(RecordReturns(T::default()))
}

fn new_map_runs<T: MapObject + Function + Default>() -> Box<dyn Instance> {
    Box::new(MapRuns(T::default()))
}

fn new_map_returns<T: MapObject + ReturnFunction + Default>() -> Box<dyn Instance> {
    Box::new(MapReturns(T::default()))
}

// --- Descriptors ---

#[derive(Clone, Copy)]
enum Shape {
    Record {
        type_id: TypeId,
        fields: fn() -> Vec<FieldDecl>,
        returns: bool,
        new: fn() -> Box<dyn Instance>,
    },
    Map {
        returns: bool,
        new: fn() -> Box<dyn Instance>,
    },
    Inert,
}

/// Describes a native function type to the binding engine. Produced by a
/// `TypeLoader`.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    type_name: &'static str,
    shape: Shape,
}

impl TypeDescriptor {
    /// A record that writes its outputs into its own fields.
    pub fn function<T: Record + Function + Default>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: Shape::Record {
                type_id: T::record_type(),
                fields: T::fields,
                returns: false,
                new: new_record_runs::<T>,
            },
        }
    }

    /// A record whose return value is the `$return` binding.
    pub fn returning<T: Record + ReturnFunction + Default>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: Shape::Record {
                type_id: T::record_type(),
                fields: T::fields,
                returns: true,
                new: new_record_returns::<T>,
            },
        }
    }

    pub fn map_function<T: MapObject + Function + Default>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: Shape::Map {
                returns: false,
                new: new_map_runs::<T>,
            },
        }
    }

    pub fn map_returning<T: MapObject + ReturnFunction + Default>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: Shape::Map {
                returns: true,
                new: new_map_returns::<T>,
            },
        }
    }

    /// A type known to a loader that exposes no execution capability.
    pub fn inert<T: ?Sized + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            shape: Shape::Inert,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.shape {
            Shape::Record { returns: false, .. } => "record",
            Shape::Record { returns: true, .. } => "returning record",
            Shape::Map { returns: false, .. } => "map",
            Shape::Map { returns: true, .. } => "returning map",
            Shape::Inert => "inert",
        };
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("shape", &shape)
            .finish()
    }
}

// --- ObjectType ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Struct,
    Map,
}

#[derive(Debug, Clone)]
enum Accessor {
    Field(Field),
    Key(String),
}

pub struct ObjectType {
    type_name: &'static str,
    kind: ObjectKind,
    returns: bool,
    new: fn() -> Box<dyn Instance>,
    trigger: Option<Accessor>,
    inputs: HashMap<String, Accessor>,
    outputs: HashMap<String, Accessor>,
    http_outputs: HashSet<String>,
}

impl ObjectType {
    /// Compiles the binding plan for `descriptor` against a function's bindings.
    ///
    /// The trigger is looked up under its type name (`httpTrigger` → field
    /// `HttpTrigger`), then under its binding name. Bindings with no matching
    /// field are left unbound.
    pub fn new<'a>(
        descriptor: &TypeDescriptor,
        trigger: Option<&Binding>,
        inputs: impl IntoIterator<Item = &'a Binding>,
        outputs: impl IntoIterator<Item = &'a Binding>,
        cache: &FieldCache,
    ) -> Result<Self> {
        let (kind, returns, new, fields) = match descriptor.shape {
            Shape::Record { type_id, fields, returns, new } => {
                (ObjectKind::Struct, returns, new, Some(cache.fields(type_id, fields)))
            }
            Shape::Map { returns, new } => (ObjectKind::Map, returns, new, None),
            Shape::Inert => return Err(Error::UnsupportedFunctionType(descriptor.type_name)),
        };

        let accessor = |name: &str| -> Option<Accessor> {
            match &fields {
                Some(fields) => lookup(fields, name).cloned().map(Accessor::Field),
                None => Some(Accessor::Key(name.to_string())),
            }
        };

        let trigger_accessor = trigger.and_then(|t| accessor(&t.kind).or_else(|| accessor(&t.name)));

        let mut input_accessors = HashMap::new();
        for binding in inputs {
            if let Some(acc) = accessor(&binding.name) {
                input_accessors.insert(binding.name.clone(), acc);
            }
        }

        let mut output_accessors = HashMap::new();
        let mut http_outputs = HashSet::new();
        for binding in outputs {
            if binding.is_http_output() {
                http_outputs.insert(binding.name.clone());
            }
            if let Some(acc) = accessor(&binding.name) {
                output_accessors.insert(binding.name.clone(), acc);
            }
        }
        if trigger.is_some_and(Binding::is_http_trigger) {
            http_outputs.insert(RETURN_BINDING.to_string());
        }

        Ok(Self {
            type_name: descriptor.type_name,
            kind,
            returns,
            new,
            trigger: trigger_accessor,
            inputs: input_accessors,
            outputs: output_accessors,
            http_outputs,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn has_return(&self) -> bool {
        self.returns
    }

    pub fn binds_trigger(&self) -> bool {
        self.trigger.is_some()
    }

    pub fn binds_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn binds_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn is_http_output(&self, name: &str) -> bool {
        self.http_outputs.contains(name)
    }

    /// A fresh, zero-valued instance.
    pub fn instantiate(&self) -> Object<'_> {
        Object {
            ty: self,
            instance: (self.new)(),
            returned: None,
            executed: false,
        }
    }

    fn wrap_http(&self, name: &str, data: Option<TypedData>) -> Option<TypedData> {
        match data {
            Some(data) if self.http_outputs.contains(name) && !data.is_http() => {
                Some(HttpMessage::wrap(data).into())
            }
            other => other,
        }
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("returns", &self.returns)
            .field("trigger", &self.trigger)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("http_outputs", &self.http_outputs)
            .finish()
    }
}

// --- Object ---

pub struct Object<'t> {
    ty: &'t ObjectType,
    instance: Box<dyn Instance>,
    returned: Option<Returned>,
    executed: bool,
}

impl Object<'_> {
    /// Binds the trigger and inputs, exposes trigger metadata on `ctx`, and
    /// runs the function.
    ///
    /// Inputs are applied in order and the first failure aborts the call.
    /// Metadata entries that fail to decode are dropped.
    pub fn call(
        &mut self,
        mut ctx: Context,
        logger: &Logger,
        trigger: Option<&TypedData>,
        metadata: &HashMap<String, TypedData>,
        inputs: &[ParameterBinding],
    ) -> Result<()> {
        let trigger = trigger.ok_or(Error::MissingTriggerData)?;
        if self.executed {
            return Err(Error::AlreadyExecuted);
        }
        self.executed = true;

        let ty = self.ty;
        let instance = &mut self.instance;
        self.returned = guarded(|| -> Result<Option<Returned>> {
            if let Some(acc) = &ty.trigger {
                write(instance.as_mut(), acc, "trigger", trigger)?;
            }
            for input in inputs {
                let Some(acc) = ty.inputs.get(&input.name) else {
                    continue;
                };
                let data = input.data.as_ref().ok_or_else(|| Error::Binding {
                    name: input.name.clone(),
                    source: azpack::Error::UnsupportedWireType { found: "unset", target: "binding" },
                })?;
                write(instance.as_mut(), acc, &input.name, data)?;
            }

            if !metadata.is_empty() {
                let decoded = metadata
                    .iter()
                    .filter_map(|(k, v)| decode(v).ok().map(|v| (k.clone(), v)))
                    .collect();
                ctx.insert(TriggerMetadata(decoded));
            }

            Ok(instance.execute(&ctx, logger))
        })?;
        Ok(())
    }

    /// The `$return` value. `None` unless the function returns a value.
    pub fn return_value(&self) -> Result<Option<TypedData>> {
        if !self.ty.returns {
            return Ok(None);
        }
        let data = match &self.returned {
            Some(value) => guarded(|| {
                value.marshal().map_err(|source| Error::Binding {
                    name: RETURN_BINDING.to_string(),
                    source,
                })
            })?,
            None => None,
        };
        Ok(self.ty.wrap_http(RETURN_BINDING, data))
    }

    /// The value of an output binding. `None` when the binding has no field or
    /// key, or holds an absent value.
    pub fn output(&self, name: &str) -> Result<Option<TypedData>> {
        let Some(acc) = self.ty.outputs.get(name) else {
            return Ok(None);
        };
        let data = guarded(|| read(self.instance.as_ref(), acc, name))?;
        Ok(self.ty.wrap_http(name, data))
    }
}

fn write(instance: &mut dyn Instance, acc: &Accessor, name: &str, data: &TypedData) -> Result<()> {
    let binding_err = |source| Error::Binding { name: name.to_string(), source };
    match acc {
        Accessor::Field(field) => instance
            .slot_mut(&field.path)
            .ok_or_else(|| Error::Unaddressable(name.to_string()))?
            .unmarshal(data)
            .map_err(binding_err),
        Accessor::Key(key) => {
            let value = decode(data).map_err(binding_err)?;
            instance
                .entries_mut()
                .ok_or_else(|| Error::Unaddressable(name.to_string()))?
                .insert(key.clone(), value);
            Ok(())
        }
    }
}

fn read(instance: &dyn Instance, acc: &Accessor, name: &str) -> Result<Option<TypedData>> {
    let binding_err = |source| Error::Binding { name: name.to_string(), source };
    match acc {
        Accessor::Field(field) => {
            // An unset optional embedding reads as absent.
            let Some(slot) = instance.slot(&field.path) else {
                return Ok(None);
            };
            let data = slot.marshal().map_err(binding_err)?;
            Ok(apply_hints(data, field))
        }
        Accessor::Key(key) => match instance.entries().and_then(|map| map.get(key)) {
            Some(value) => value.marshal().map_err(binding_err),
            None => Ok(None),
        },
    }
}

fn apply_hints(data: Option<TypedData>, field: &Field) -> Option<TypedData> {
    let data = data?;
    if field.hints.omit_empty && is_empty(&data) {
        return None;
    }
    if field.hints.as_string {
        return Some(match data {
            TypedData::Int(i) => TypedData::String(i.to_string()),
            TypedData::Double(d) => TypedData::String(format_double(d)),
            other => other,
        });
    }
    Some(data)
}

fn is_empty(data: &TypedData) -> bool {
    match data {
        TypedData::String(s) => s.is_empty(),
        TypedData::Json(s) => s.is_empty() || s == "null",
        TypedData::Bytes(b) | TypedData::Stream(b) => b.is_empty(),
        TypedData::Int(i) => *i == 0,
        TypedData::Double(d) => *d == 0.0,
        TypedData::CollectionBytes(v) => v.is_empty(),
        TypedData::CollectionString(v) => v.is_empty(),
        TypedData::CollectionSint64(v) => v.is_empty(),
        TypedData::CollectionDouble(v) => v.is_empty(),
        TypedData::Http(_) => false,
    }
}

/// Runs user-reachable code, turning a panic into `Error::Panicked`. Output
/// marshaling counts: a `Marshal` impl is user code too.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
