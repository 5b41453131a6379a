//! # Wire Values
//!
//! `TypedData` is the closed, self-describing value union exchanged with the
//! host. Every binding payload, trigger metadata entry and return value travels
//! as one of these variants.
//!
//! ## Invariants
//! - **Closed Set**: The variant list is fixed by the host schema. A payload that
//!   carries no variant at all is represented one level up as `Option::None`
//!   (see `ParameterBinding::data`, `HttpMessage::body`).
//! - **Nullable Cookies**: Cookie attributes that the host treats as nullable are
//!   `Option`s, so "absent" and "zero" remain distinguishable.

use std::collections::HashMap;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

/// Status code assumed for HTTP messages that carry none.
pub const DEFAULT_STATUS_CODE: &str = "200";

/// A single wire value.
///
/// The JSON layout is local to this crate's length-prefixed transport and is
/// not the host's protobuf JSON mapping: a value is an object with one
/// camelCase key, collections are bare arrays (`{"collectionString":["a"]}`,
/// not `{"collectionString":{"string":["a"]}}`) and bytes are arrays of
/// numbers rather than base64 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedData {
    String(String),
    Json(String),
    Bytes(Vec<u8>),
    Stream(Vec<u8>),
    Http(Box<HttpMessage>),
    Int(i64),
    Double(f64),
    CollectionBytes(Vec<Vec<u8>>),
    CollectionString(Vec<String>),
    CollectionSint64(Vec<i64>),
    CollectionDouble(Vec<f64>),
}

impl TypedData {
    /// Short variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
            Self::Http(_) => "http",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::CollectionBytes(_) => "collection_bytes",
            Self::CollectionString(_) => "collection_string",
            Self::CollectionSint64(_) => "collection_sint64",
            Self::CollectionDouble(_) => "collection_double",
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl From<HttpMessage> for TypedData {
    fn from(msg: HttpMessage) -> Self {
        Self::Http(Box::new(msg))
    }
}

/// The HTTP envelope used both for HTTP triggers and HTTP outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpMessage {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub body: Option<TypedData>,
    pub raw_body: Option<TypedData>,
    /// String-encoded integer. Empty means `DEFAULT_STATUS_CODE`.
    pub status_code: String,
    pub cookies: Vec<Cookie>,
}

impl HttpMessage {
    /// Wraps a plain value as a successful HTTP response body.
    pub fn wrap(body: TypedData) -> Self {
        Self {
            status_code: DEFAULT_STATUS_CODE.to_string(),
            body: Some(body),
            ..Self::default()
        }
    }

    /// The status code, with the empty string read as `DEFAULT_STATUS_CODE`.
    pub fn status(&self) -> &str {
        if self.status_code.is_empty() {
            DEFAULT_STATUS_CODE
        } else {
            &self.status_code
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<Timestamp>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
    pub max_age: Option<f64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SameSite {
    Lax,
    Strict,
    ExplicitNone,
}

/// Seconds and nanoseconds since the Unix epoch. `nanos` is always in `0..1e9`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self {
                seconds: d.as_secs() as i64,
                nanos: d.subsec_nanos() as i32,
            },
            Err(before) => {
                let d = before.duration();
                let secs = d.as_secs() as i64;
                let sub = d.subsec_nanos() as i32;
                if sub == 0 {
                    Self { seconds: -secs, nanos: 0 }
                } else {
                    Self { seconds: -secs - 1, nanos: 1_000_000_000 - sub }
                }
            }
        }
    }
}
