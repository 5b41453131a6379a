//! Dynamic values produced by `decode`.
//!
//! `Value` is what a field of unknown shape receives: an untyped binding map
//! entry, a `Value`-typed struct field, or a decoded trigger metadata entry.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::Serializer;

use crate::typed::HttpMessage;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Strings(Vec<String>),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
    BytesList(Vec<Vec<u8>>),
    /// Decoded JSON text.
    Json(serde_json::Value),
    /// An HTTP message kept as-is. Decoding produces `Record` instead; this is
    /// for values a function builds itself.
    Http(Box<HttpMessage>),
    /// Generic string-keyed record, e.g. a decoded HTTP request.
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Strings(_) => "strings",
            Value::Ints(_) => "ints",
            Value::Doubles(_) => "doubles",
            Value::BytesList(_) => "bytes_list",
            Value::Json(_) => "json",
            Value::Http(_) => "http",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            Value::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    /// Looks up a key in a `Record`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(map) => map.get(key),
            _ => None,
        }
    }

    /// Converts to a JSON tree. Byte sequences become arrays of numbers;
    /// non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Double(d) => number(*d),
            Value::String(s) => J::String(s.clone()),
            Value::Bytes(b) => J::from(b.clone()),
            Value::Strings(v) => J::from(v.clone()),
            Value::Ints(v) => J::from(v.clone()),
            Value::Doubles(v) => J::Array(v.iter().copied().map(number).collect()),
            Value::BytesList(v) => J::Array(v.iter().map(|b| J::from(b.clone())).collect()),
            Value::Json(v) => v.clone(),
            Value::Http(msg) => serde_json::to_value(msg).unwrap_or(J::Null),
            Value::Record(map) => J::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn number(d: f64) -> serde_json::Value {
    serde_json::Number::from_f64(d)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<HttpMessage> for Value {
    fn from(msg: HttpMessage) -> Self {
        Value::Http(Box::new(msg))
    }
}
