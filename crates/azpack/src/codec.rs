//! # Codec
//!
//! Conversion between `TypedData` and native values.
//!
//! ## Decode
//!
//! `decode` maps any wire variant to a `Value` without knowing the target type.
//! An HTTP message becomes a `Record` keyed `method`, `url`, `headers`, `query`,
//! `params`, `body` and `rawBody`, with the bodies decoded recursively.
//!
//! ## Encode
//!
//! `Marshal` is implemented for every native shape the wire can carry:
//!
//! | Native                                  | Wire                 |
//! |-----------------------------------------|----------------------|
//! | `String`, `str`                         | `string`             |
//! | `Vec<u8>`, `[u8]`                       | `bytes`              |
//! | every integer width                     | `int` (widened)      |
//! | `f32`, `f64`                            | `double`             |
//! | `bool`                                  | `int` 0 / 1          |
//! | `Vec<String>`                           | `collection_string`  |
//! | `Vec<{integer}>`                        | `collection_sint64`  |
//! | `Vec<f32>`, `Vec<f64>`                  | `collection_double`  |
//! | `Vec<Vec<u8>>`                          | `collection_bytes`   |
//! | `HttpMessage`                           | `http`               |
//! | maps, `serde_json::Value`, `Json<T>`    | `json`               |
//!
//! `Option<T>` and `Box<T>` unwrap one level; `None` marshals to "absent".
//! Named types reach the table through `#[derive(Marshal)]` delegation or a
//! hand-written impl, which always takes precedence. Anything else that is
//! `Serialize` goes through `Json<T>` / `encode_json`.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::macros::for_each_float;
use crate::macros::for_each_int;
use crate::macros::for_each_int_element;
use crate::typed::HttpMessage;
use crate::typed::TypedData;
use crate::value::Value;

/// Decodes a wire value into its natural dynamic shape.
pub fn decode(data: &TypedData) -> Result<Value> {
    let value = match data {
        TypedData::String(s) => Value::String(s.clone()),
        TypedData::Json(text) => Value::Json(serde_json::from_str(text)?),
        TypedData::Bytes(b) | TypedData::Stream(b) => Value::Bytes(b.clone()),
        TypedData::Http(msg) => decode_http(msg)?,
        TypedData::Int(i) => Value::Int(*i),
        TypedData::Double(d) => Value::Double(*d),
        TypedData::CollectionBytes(v) => Value::BytesList(v.clone()),
        TypedData::CollectionString(v) => Value::Strings(v.clone()),
        TypedData::CollectionSint64(v) => Value::Ints(v.clone()),
        TypedData::CollectionDouble(v) => Value::Doubles(v.clone()),
    };
    Ok(value)
}

/// Decodes a payload that may be an empty union.
pub fn decode_optional(data: Option<&TypedData>) -> Result<Value> {
    match data {
        Some(data) => decode(data),
        None => Err(Error::UnsupportedWireType { found: "unset", target: "value" }),
    }
}

fn decode_http(msg: &HttpMessage) -> Result<Value> {
    let strings = |map: &HashMap<String, String>| {
        Value::Record(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    };

    let body = match &msg.body {
        Some(body) => decode(body)?,
        None => Value::Null,
    };
    let raw_body = match &msg.raw_body {
        Some(raw) => decode(raw)?,
        None => body.clone(),
    };

    let mut record = BTreeMap::new();
    record.insert("method".to_string(), Value::String(msg.method.clone()));
    record.insert("url".to_string(), Value::String(msg.url.clone()));
    record.insert("headers".to_string(), strings(&msg.headers));
    record.insert("query".to_string(), strings(&msg.query));
    record.insert("params".to_string(), strings(&msg.params));
    record.insert("body".to_string(), body);
    record.insert("rawBody".to_string(), raw_body);
    Ok(Value::Record(record))
}

/// Serializes any `Serialize` value as `json` text. This is the fallback for
/// composite values with no more specific wire shape.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<TypedData> {
    Ok(TypedData::Json(serde_json::to_string(value)?))
}

/// A native value that can produce its own wire representation.
pub trait Marshal {
    /// Returns `Ok(None)` when the value is absent and should not be emitted.
    fn marshal(&self) -> Result<Option<TypedData>>;
}

/// Binds a composite `serde` value to the `json` wire variant in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> Marshal for Json<T> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        encode_json(&self.0).map(Some)
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn marshal(&self) -> Result<Option<TypedData>> {
        (**self).marshal()
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        (**self).marshal()
    }
}

impl<T: Marshal> Marshal for Option<T> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        match self {
            Some(inner) => inner.marshal(),
            None => Ok(None),
        }
    }
}

impl Marshal for str {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::String(self.to_string())))
    }
}

impl Marshal for String {
    fn marshal(&self) -> Result<Option<TypedData>> {
        self.as_str().marshal()
    }
}

impl Marshal for [u8] {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::Bytes(self.to_vec())))
    }
}

impl Marshal for Vec<u8> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        self.as_slice().marshal()
    }
}

impl Marshal for bool {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::Int(i64::from(*self))))
    }
}

pub(crate) fn widen<T>(value: T, target: &'static str) -> Result<i64>
where
    T: Copy + ToString,
    i64: TryFrom<T>,
{
    i64::try_from(value).map_err(|_| Error::OutOfRange { value: value.to_string(), target })
}

macro_rules! marshal_int {
    ($ty:ty, $sign:ident) => {
        impl Marshal for $ty {
            fn marshal(&self) -> Result<Option<TypedData>> {
                Ok(Some(TypedData::Int(widen(*self, "int64")?)))
            }
        }
    };
}

macro_rules! marshal_float {
    ($ty:ty) => {
        impl Marshal for $ty {
            fn marshal(&self) -> Result<Option<TypedData>> {
                Ok(Some(TypedData::Double(f64::from(*self))))
            }
        }

        impl Marshal for Vec<$ty> {
            fn marshal(&self) -> Result<Option<TypedData>> {
                Ok(Some(TypedData::CollectionDouble(
                    self.iter().map(|v| f64::from(*v)).collect(),
                )))
            }
        }
    };
}

macro_rules! marshal_int_collection {
    ($ty:ty) => {
        impl Marshal for Vec<$ty> {
            fn marshal(&self) -> Result<Option<TypedData>> {
                let ints = self
                    .iter()
                    .map(|v| widen(*v, "int64"))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(TypedData::CollectionSint64(ints)))
            }
        }
    };
}

for_each_int!(marshal_int);
for_each_float!(marshal_float);
for_each_int_element!(marshal_int_collection);

impl Marshal for Vec<String> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::CollectionString(self.clone())))
    }
}

impl Marshal for Vec<Vec<u8>> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::CollectionBytes(self.clone())))
    }
}

impl Marshal for TypedData {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(self.clone()))
    }
}

impl Marshal for HttpMessage {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::Http(Box::new(self.clone()))))
    }
}

impl Marshal for serde_json::Value {
    fn marshal(&self) -> Result<Option<TypedData>> {
        Ok(Some(TypedData::Json(self.to_string())))
    }
}

impl<V: Serialize> Marshal for HashMap<String, V> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        encode_json(self).map(Some)
    }
}

impl<V: Serialize> Marshal for BTreeMap<String, V> {
    fn marshal(&self) -> Result<Option<TypedData>> {
        encode_json(self).map(Some)
    }
}

impl Marshal for Value {
    fn marshal(&self) -> Result<Option<TypedData>> {
        let data = match self {
            Value::Null => return Ok(None),
            Value::Bool(b) => TypedData::Int(i64::from(*b)),
            Value::Int(i) => TypedData::Int(*i),
            Value::Double(d) => TypedData::Double(*d),
            Value::String(s) => TypedData::String(s.clone()),
            Value::Bytes(b) => TypedData::Bytes(b.clone()),
            Value::Strings(v) => TypedData::CollectionString(v.clone()),
            Value::Ints(v) => TypedData::CollectionSint64(v.clone()),
            Value::Doubles(v) => TypedData::CollectionDouble(v.clone()),
            Value::BytesList(v) => TypedData::CollectionBytes(v.clone()),
            Value::Json(v) => TypedData::Json(v.to_string()),
            Value::Http(msg) => TypedData::Http(msg.clone()),
            Value::Record(_) => encode_json(self)?,
        };
        Ok(Some(data))
    }
}
