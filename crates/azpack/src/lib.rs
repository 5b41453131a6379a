//! # Azpack
//!
//! Wire values, protocol messages, and the codec between them and native Rust
//! values for an out-of-process function worker.
//!
//! ## Philosophy
//!
//! - **Closed Union**: `TypedData` has exactly the variants the host defines. The
//!   codec never invents new ones.
//! - **Traits over Reflection**: A native type says how it reads and writes itself
//!   by implementing `Marshal` and `Unmarshal`. Records describe their bindable
//!   fields through a generated `Record` impl instead of runtime introspection.
//! - **Lenient In, Canonical Out**: Unmarshal accepts every wire variant that can
//!   reasonably produce the target (a string field takes an int). Marshal always
//!   produces the one canonical variant for a type.
//!
//! ## Layout
//!
//! - `typed`: `TypedData`, `HttpMessage`, cookies.
//! - `message`: the protocol message union.
//! - `value`: `Value`, the dynamic result of decoding.
//! - `codec`: `decode` and the `Marshal` capability.
//! - `unmarshal`: the `Unmarshal` capability.
//! - `record`: static field descriptors for structured types.

extern crate self as azpack;

mod macros;

pub mod codec;
pub mod message;
pub mod record;
pub mod typed;
pub mod unmarshal;
pub mod value;

#[cfg(test)]
mod tests;

pub use codec::Json;
pub use codec::Marshal;
pub use codec::decode;
pub use codec::encode_json;
pub use record::Embedded;
pub use record::FieldDecl;
pub use record::Hints;
pub use record::Record;
pub use record::Slot;
pub use typed::Cookie;
pub use typed::HttpMessage;
pub use typed::SameSite;
pub use typed::Timestamp;
pub use typed::TypedData;
pub use unmarshal::Unmarshal;
pub use value::Value;

#[cfg(feature = "derive")]
pub use azpack_derive::Marshal;
#[cfg(feature = "derive")]
pub use azpack_derive::Record;
#[cfg(feature = "derive")]
pub use azpack_derive::Unmarshal;

/// Codec errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The wire variant cannot produce the requested native shape.
    UnsupportedWireType { found: &'static str, target: &'static str },
    /// Embedded JSON text is malformed, or a value failed to serialize.
    Json(String),
    /// A string payload did not parse as the requested scalar.
    Parse { input: String, target: &'static str },
    /// A number does not fit the target width.
    OutOfRange { value: String, target: &'static str },
    /// Byte payload bound to a string is not valid UTF-8.
    InvalidUtf8,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedWireType { found, target } => {
                write!(f, "unsupported wire type `{}` for {}", found, target)
            }
            Error::Json(msg) => write!(f, "json: {}", msg),
            Error::Parse { input, target } => write!(f, "cannot parse {:?} as {}", input, target),
            Error::OutOfRange { value, target } => write!(f, "{} is out of range for {}", value, target),
            Error::InvalidUtf8 => write!(f, "byte payload is not valid utf-8"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

/// Specialized `Result` for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn unsupported(found: &TypedData, target: &'static str) -> Error {
    Error::UnsupportedWireType { found: found.kind(), target }
}
