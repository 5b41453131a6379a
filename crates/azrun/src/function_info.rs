//! Function metadata as received from the host, validated and split into
//! trigger, inputs and outputs.

use std::collections::HashMap;
use std::fmt;

use azpack::message::BindingInfo;
use azpack::message::DataType;
use azpack::message::Direction;
use azpack::message::RpcFunctionMetadata;

pub const HTTP_TRIGGER: &str = "httpTrigger";
pub const HTTP_OUTPUT: &str = "http";
/// Reserved output binding for a function's return value.
pub const RETURN_BINDING: &str = "$return";
pub const DEFAULT_ENTRY_POINT: &str = "Function";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidEntryPoint(String),
    MultipleTriggers { first: String, second: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEntryPoint(name) => write!(f, "invalid entry point: {:?}", name),
            Self::MultipleTriggers { first, second } => {
                write!(f, "function declares more than one trigger: {} and {}", first, second)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    /// Host type discriminator, e.g. `httpTrigger`, `http`, `blob`.
    pub kind: String,
    pub direction: Direction,
    pub data_type: DataType,
}

impl Binding {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            direction,
            data_type: DataType::Undefined,
        }
    }

    fn from_info(name: &str, info: &BindingInfo) -> Self {
        Self {
            name: name.to_string(),
            kind: info.kind.clone(),
            direction: info.direction,
            data_type: info.data_type,
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.kind.ends_with("Trigger")
    }

    pub fn is_http_trigger(&self) -> bool {
        self.kind == HTTP_TRIGGER
    }

    pub fn is_http_output(&self) -> bool {
        self.kind == HTTP_OUTPUT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub directory: String,
    pub script_file: String,
    pub entry_point: String,
    pub trigger: Option<Binding>,
    pub inputs: HashMap<String, Binding>,
    /// `inout` bindings appear here and in `inputs`.
    pub outputs: HashMap<String, Binding>,
}

impl FunctionInfo {
    pub fn from_metadata(meta: &RpcFunctionMetadata) -> Result<Self> {
        let mut info = FunctionInfo {
            name: meta.name.clone(),
            directory: meta.directory.clone(),
            script_file: meta.script_file.clone(),
            entry_point: entry_point(&meta.entry_point)?,
            trigger: None,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        };

        let mut names: Vec<&String> = meta.bindings.keys().collect();
        names.sort();
        for name in names {
            let binding = Binding::from_info(name, &meta.bindings[name]);
            if binding.is_trigger() {
                if let Some(first) = &info.trigger {
                    return Err(Error::MultipleTriggers {
                        first: first.name.clone(),
                        second: binding.name,
                    });
                }
                info.trigger = Some(binding);
                continue;
            }
            match binding.direction {
                Direction::In => {
                    info.inputs.insert(binding.name.clone(), binding);
                }
                Direction::Out => {
                    info.outputs.insert(binding.name.clone(), binding);
                }
                Direction::Inout => {
                    info.inputs.insert(binding.name.clone(), binding.clone());
                    info.outputs.insert(binding.name.clone(), binding);
                }
            }
        }
        Ok(info)
    }

    pub fn trigger_name(&self) -> Option<&str> {
        self.trigger.as_ref().map(|t| t.name.as_str())
    }
}

/// Normalizes an entry point name: empty becomes `DEFAULT_ENTRY_POINT`, the
/// first letter is capitalized, and the result must be an identifier.
pub fn entry_point(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Ok(DEFAULT_ENTRY_POINT.to_string());
    }

    let mut chars = raw.chars();
    let name: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    if is_exported_identifier(&name) {
        Ok(name)
    } else {
        Err(Error::InvalidEntryPoint(raw.to_string()))
    }
}

fn is_exported_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}
