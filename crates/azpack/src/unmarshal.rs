//! The `Unmarshal` capability: writing a wire value into an existing native slot.
//!
//! Targets are lenient about the variant they accept:
//!
//! - `String`: string, int, double, bytes, stream, json (raw text).
//! - integers: string (parsed), int, json literal. Narrowing that loses value is an error.
//! - floats: string (parsed), int, double, json literal.
//! - `bool`: string (`true`/`1`/`t`/… or any nonzero number), int or double
//!   (nonzero), json literal.
//! - `Vec<u8>`: bytes, stream, string, json.
//! - number/string/bytes vectors: only the matching collection variant.
//! - maps, `serde_json::Value`, `Json<T>`: bytes, stream, string or json, parsed as JSON.
//! - `Value`: whatever `decode` produces.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::Error;
use crate::Result;
use crate::codec::Json;
use crate::codec::decode;
use crate::macros::for_each_float;
use crate::macros::for_each_int;
use crate::macros::for_each_int_element;
use crate::typed::HttpMessage;
use crate::typed::TypedData;
use crate::unsupported;
use crate::value::Value;

/// A native slot that can be overwritten from a wire value.
pub trait Unmarshal {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()>;
}

impl<T: Unmarshal + ?Sized> Unmarshal for Box<T> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        (**self).unmarshal(data)
    }
}

/// An empty optional is allocated before it is written, so `Option<T>` behaves
/// like a nullable pointer field.
impl<T: Unmarshal + Default> Unmarshal for Option<T> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        self.get_or_insert_with(T::default).unmarshal(data)
    }
}

/// Formats a double with the shortest representation that round-trips.
pub fn format_double(d: f64) -> String {
    format!("{}", d)
}

/// Accepts the spellings `true`, `True`, `TRUE`, `t`, `T`, `1` and their false
/// counterparts, then falls back to "any nonzero number".
pub fn parse_bool(input: &str) -> Result<bool> {
    match input {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        other => other
            .trim()
            .parse::<f64>()
            .map(|n| n != 0.0)
            .map_err(|_| Error::Parse { input: input.to_string(), target: "bool" }),
    }
}

fn parse_wide(input: &str, target: &'static str) -> Result<i128> {
    input
        .trim()
        .parse::<i128>()
        .map_err(|_| Error::Parse { input: input.to_string(), target })
}

fn parse_float(input: &str, target: &'static str) -> Result<f64> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Parse { input: input.to_string(), target })
}

/// The raw JSON text carried by any of the four text-like variants.
fn json_text<'a>(data: &'a TypedData, target: &'static str) -> Result<&'a [u8]> {
    match data {
        TypedData::Json(s) | TypedData::String(s) => Ok(s.as_bytes()),
        TypedData::Bytes(b) | TypedData::Stream(b) => Ok(b),
        other => Err(unsupported(other, target)),
    }
}

fn from_json<T: DeserializeOwned>(data: &TypedData, target: &'static str) -> Result<T> {
    Ok(serde_json::from_slice(json_text(data, target)?)?)
}

impl Unmarshal for String {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = match data {
            TypedData::String(s) | TypedData::Json(s) => s.clone(),
            TypedData::Int(i) => i.to_string(),
            TypedData::Double(d) => format_double(*d),
            TypedData::Bytes(b) | TypedData::Stream(b) => {
                String::from_utf8(b.clone()).map_err(|_| Error::InvalidUtf8)?
            }
            other => return Err(unsupported(other, "string")),
        };
        Ok(())
    }
}

impl Unmarshal for bool {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = match data {
            TypedData::String(s) => parse_bool(s)?,
            TypedData::Int(i) => *i != 0,
            TypedData::Double(d) => *d != 0.0,
            TypedData::Json(s) => serde_json::from_str(s)?,
            other => return Err(unsupported(other, "bool")),
        };
        Ok(())
    }
}

macro_rules! unmarshal_int {
    ($ty:ty, $sign:ident) => {
        impl Unmarshal for $ty {
            fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
                let target = stringify!($ty);
                let wide = match data {
                    TypedData::String(s) | TypedData::Json(s) => parse_wide(s, target)?,
                    TypedData::Int(i) => i128::from(*i),
                    other => return Err(unsupported(other, target)),
                };
                *self = <$ty>::try_from(wide)
                    .map_err(|_| Error::OutOfRange { value: wide.to_string(), target })?;
                Ok(())
            }
        }
    };
}

macro_rules! unmarshal_float {
    ($ty:ty) => {
        impl Unmarshal for $ty {
            fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
                let target = stringify!($ty);
                let wide = match data {
                    TypedData::String(s) | TypedData::Json(s) => parse_float(s, target)?,
                    TypedData::Int(i) => *i as f64,
                    TypedData::Double(d) => *d,
                    other => return Err(unsupported(other, target)),
                };
                *self = wide as $ty;
                Ok(())
            }
        }

        impl Unmarshal for Vec<$ty> {
            fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
                match data {
                    TypedData::CollectionDouble(v) => {
                        *self = v.iter().map(|d| *d as $ty).collect();
                        Ok(())
                    }
                    other => Err(unsupported(other, concat!("Vec<", stringify!($ty), ">"))),
                }
            }
        }
    };
}

macro_rules! unmarshal_int_collection {
    ($ty:ty) => {
        impl Unmarshal for Vec<$ty> {
            fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
                let target = concat!("Vec<", stringify!($ty), ">");
                match data {
                    TypedData::CollectionSint64(v) => {
                        *self = v
                            .iter()
                            .map(|i| {
                                <$ty>::try_from(*i)
                                    .map_err(|_| Error::OutOfRange { value: i.to_string(), target })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(())
                    }
                    other => Err(unsupported(other, target)),
                }
            }
        }
    };
}

for_each_int!(unmarshal_int);
for_each_float!(unmarshal_float);
for_each_int_element!(unmarshal_int_collection);

impl Unmarshal for Vec<u8> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = match data {
            TypedData::Bytes(b) | TypedData::Stream(b) => b.clone(),
            TypedData::String(s) | TypedData::Json(s) => s.as_bytes().to_vec(),
            other => return Err(unsupported(other, "bytes")),
        };
        Ok(())
    }
}

impl Unmarshal for Vec<String> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        match data {
            TypedData::CollectionString(v) => {
                *self = v.clone();
                Ok(())
            }
            other => Err(unsupported(other, "Vec<String>")),
        }
    }
}

impl Unmarshal for Vec<Vec<u8>> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        match data {
            TypedData::CollectionBytes(v) => {
                *self = v.clone();
                Ok(())
            }
            other => Err(unsupported(other, "Vec<Vec<u8>>")),
        }
    }
}

impl Unmarshal for TypedData {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = data.clone();
        Ok(())
    }
}

impl Unmarshal for HttpMessage {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        match data {
            TypedData::Http(msg) => {
                *self = (**msg).clone();
                Ok(())
            }
            other => Err(unsupported(other, "http message")),
        }
    }
}

impl Unmarshal for Value {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = decode(data)?;
        Ok(())
    }
}

impl Unmarshal for serde_json::Value {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = from_json(data, "json value")?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Unmarshal for Json<T> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        self.0 = from_json(data, "json")?;
        Ok(())
    }
}

impl<V: DeserializeOwned> Unmarshal for HashMap<String, V> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = from_json(data, "map")?;
        Ok(())
    }
}

impl<V: DeserializeOwned> Unmarshal for BTreeMap<String, V> {
    fn unmarshal(&mut self, data: &TypedData) -> Result<()> {
        *self = from_json(data, "map")?;
        Ok(())
    }
}
