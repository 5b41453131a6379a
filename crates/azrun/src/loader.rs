//! # Function Registry
//!
//! Maps function ids to their metadata and compiled `ObjectType`.
//!
//! Native types come from a `TypeLoader`. The registry validates metadata,
//! asks the loader for a descriptor, compiles the binding plan against its own
//! `FieldCache`, and stores the result. Lookups and loads may race freely; the
//! map is concurrent and entries are immutable once inserted.

use std::backtrace::BacktraceStatus;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use azpack::message::RpcFunctionMetadata;
use dashmap::DashMap;

use crate::field::FieldCache;
use crate::function_info;
use crate::function_info::FunctionInfo;
use crate::logger::Logger;
use crate::object;
use crate::object::ObjectType;
use crate::object::TypeDescriptor;

#[derive(Debug)]
pub enum Error {
    Metadata(function_info::Error),
    Loader(anyhow::Error),
    ObjectType(object::Error),
    NotLoaded(String),
}

impl Error {
    /// Backtrace captured by the loader, when it captured one.
    pub fn stack_trace(&self) -> Option<String> {
        match self {
            Self::Loader(e) if e.backtrace().status() == BacktraceStatus::Captured => {
                Some(e.backtrace().to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata(e) => write!(f, "invalid function metadata: {}", e),
            Self::Loader(e) => write!(f, "type loader: {:#}", e),
            Self::ObjectType(e) => write!(f, "{}", e),
            Self::NotLoaded(id) => write!(f, "function {} is not loaded", id),
        }
    }
}

impl std::error::Error for Error {}

impl From<function_info::Error> for Error {
    fn from(e: function_info::Error) -> Self {
        Self::Metadata(e)
    }
}

impl From<object::Error> for Error {
    fn from(e: object::Error) -> Self {
        Self::ObjectType(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Resolves the native type implementing a function.
pub trait TypeLoader: Send + Sync + 'static {
    fn function_type(&self, info: &FunctionInfo, logger: &Logger) -> anyhow::Result<TypeDescriptor>;
}

/// A loader over types linked into the worker binary, keyed by
/// `"{function name}.{entry point}"`.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    types: HashMap<String, TypeDescriptor>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type. An empty entry point means the default one.
    pub fn register(&mut self, function: &str, entry_point: &str, descriptor: TypeDescriptor) -> &mut Self {
        let entry = function_info::entry_point(entry_point).unwrap_or_else(|_| entry_point.to_string());
        self.types.insert(format!("{}.{}", function, entry), descriptor);
        self
    }

    pub fn with(mut self, function: &str, entry_point: &str, descriptor: TypeDescriptor) -> Self {
        self.register(function, entry_point, descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeLoader for StaticLoader {
    fn function_type(&self, info: &FunctionInfo, _logger: &Logger) -> anyhow::Result<TypeDescriptor> {
        let key = format!("{}.{}", info.name, info.entry_point);
        self.types
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no function type registered for {}", key))
    }
}

/// A function ready to be invoked.
#[derive(Debug)]
pub struct LoadedFunction {
    pub id: String,
    pub info: FunctionInfo,
    pub object_type: ObjectType,
}

pub struct Registry {
    loader: Arc<dyn TypeLoader>,
    functions: DashMap<String, Arc<LoadedFunction>>,
    fields: FieldCache,
}

impl Registry {
    pub fn new(loader: impl TypeLoader) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    pub fn with_loader(loader: Arc<dyn TypeLoader>) -> Self {
        Self {
            loader,
            functions: DashMap::new(),
            fields: FieldCache::new(),
        }
    }

    /// Loads and registers a function, replacing any previous entry under `id`.
    /// On failure nothing is registered.
    pub fn load(&self, id: &str, metadata: &RpcFunctionMetadata, logger: &Logger) -> Result<Arc<LoadedFunction>> {
        let info = FunctionInfo::from_metadata(metadata)?;
        let descriptor = self.loader.function_type(&info, logger).map_err(Error::Loader)?;
        let object_type = ObjectType::new(
            &descriptor,
            info.trigger.as_ref(),
            info.inputs.values(),
            info.outputs.values(),
            &self.fields,
        )?;

        let function = Arc::new(LoadedFunction {
            id: id.to_string(),
            info,
            object_type,
        });
        self.functions.insert(id.to_string(), function.clone());
        Ok(function)
    }

    pub fn get(&self, id: &str) -> Result<Arc<LoadedFunction>> {
        self.functions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotLoaded(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.fields
    }
}
