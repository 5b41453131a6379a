//! # Function API
//!
//! What user code sees: the two execution capabilities, the invocation
//! context, and the HTTP request/response types.
//!
//! A function object is a plain struct (or binding map) whose fields are filled
//! from the invocation's bindings before `run` is called. Output bindings are
//! read back from the same fields afterwards, or from the returned value for
//! `ReturnFunction`.

use std::collections::BTreeMap;
use std::collections::HashMap;

use azpack::Cookie;
use azpack::HttpMessage;
use azpack::Marshal;
use azpack::TypedData;
use azpack::Unmarshal;
use azpack::Value;
use azpack::decode;
use serde::Serialize;

use crate::logger::Logger;

/// Executes by mutating its own output fields.
pub trait Function: Send + 'static {
    fn run(&mut self, ctx: &Context, logger: &Logger);
}

/// Executes and yields a value for the `$return` binding.
pub trait ReturnFunction: Send + 'static {
    type Output: Marshal + Send + 'static;

    fn run(&mut self, ctx: &Context, logger: &Logger) -> Self::Output;
}

/// Decoded trigger metadata, stored in the `Context` extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerMetadata(pub HashMap<String, Value>);

/// Per-invocation context.
pub struct Context {
    invocation_id: String,
    function_id: String,
    extensions: anymap::Map<dyn anymap::any::Any + Send + Sync>,
}

impl Context {
    pub fn new(invocation_id: impl Into<String>, function_id: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            function_id: function_id.into(),
            extensions: anymap::Map::new(),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.extensions.insert(val)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    pub fn trigger_metadata(&self) -> Option<&HashMap<String, Value>> {
        self.get::<TriggerMetadata>().map(|m| &m.0)
    }
}

/// Canonical MIME header form: `content-type` → `Content-Type`. Keys holding
/// characters outside the token set are returned unchanged.
pub fn canonical_header_key(key: &str) -> String {
    let valid = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return key.to_string();
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}

/// An HTTP trigger payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub url: String,
    /// Keys in canonical form; see `header` for lookups.
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: Value,
    /// Falls back to `body` when the host sends no raw body.
    pub raw_body: Value,
}

impl Request {
    pub fn from_http(msg: &HttpMessage) -> azpack::Result<Self> {
        let body = match &msg.body {
            Some(body) => decode(body)?,
            None => Value::Null,
        };
        let raw_body = match &msg.raw_body {
            Some(raw) => decode(raw)?,
            None => body.clone(),
        };

        Ok(Self {
            method: msg.method.clone(),
            url: msg.url.clone(),
            headers: msg
                .headers
                .iter()
                .map(|(k, v)| (canonical_header_key(k), v.clone()))
                .collect(),
            query: msg.query.clone().into_iter().collect(),
            params: msg.params.clone().into_iter().collect(),
            body,
            raw_body,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&canonical_header_key(name)).map(String::as_str)
    }
}

impl Unmarshal for Request {
    fn unmarshal(&mut self, data: &TypedData) -> azpack::Result<()> {
        match data {
            TypedData::Http(msg) => {
                *self = Request::from_http(msg)?;
                Ok(())
            }
            other => Err(azpack::Error::UnsupportedWireType {
                found: other.kind(),
                target: "http request",
            }),
        }
    }
}

impl Marshal for Request {
    fn marshal(&self) -> azpack::Result<Option<TypedData>> {
        let msg = HttpMessage {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone().into_iter().collect(),
            query: self.query.clone().into_iter().collect(),
            params: self.params.clone().into_iter().collect(),
            body: self.body.marshal()?,
            raw_body: self.raw_body.marshal()?,
            ..HttpMessage::default()
        };
        Ok(Some(msg.into()))
    }
}

/// An HTTP output. A zero `status_code` is sent as 200.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<Cookie>,
    pub body: Value,
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(canonical_header_key(name), value.into());
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }
}

impl Marshal for Response {
    fn marshal(&self) -> azpack::Result<Option<TypedData>> {
        let status_code = match self.status_code {
            0 => azpack::typed::DEFAULT_STATUS_CODE.to_string(),
            code => code.to_string(),
        };
        let msg = HttpMessage {
            headers: self.headers.clone().into_iter().collect(),
            cookies: self.cookies.clone(),
            status_code,
            body: self.body.marshal()?,
            ..HttpMessage::default()
        };
        Ok(Some(msg.into()))
    }
}

impl Unmarshal for Response {
    fn unmarshal(&mut self, data: &TypedData) -> azpack::Result<()> {
        let TypedData::Http(msg) = data else {
            return Err(azpack::Error::UnsupportedWireType {
                found: data.kind(),
                target: "http response",
            });
        };
        let status_code = match msg.status_code.as_str() {
            "" => 0,
            code => code.parse().map_err(|_| azpack::Error::Parse {
                input: code.to_string(),
                target: "status code",
            })?,
        };
        *self = Response {
            status_code,
            headers: msg
                .headers
                .iter()
                .map(|(k, v)| (canonical_header_key(k), v.clone()))
                .collect(),
            cookies: msg.cookies.clone(),
            body: match &msg.body {
                Some(body) => decode(body)?,
                None => Value::Null,
            },
        };
        Ok(())
    }
}
