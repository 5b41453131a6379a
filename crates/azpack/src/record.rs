//! # Record Descriptors
//!
//! Static descriptions of structured types, generated by `#[derive(Record)]`.
//!
//! A record lists its bindable fields in declaration order. A field is either a
//! leaf (a `Slot` that reads and writes wire values) or an embedded record whose
//! own fields are promoted into the parent. Fields are addressed by index paths:
//! `[2]` is the third listed field, `[1, 0]` the first field of the embedded
//! record listed second.
//!
//! Name resolution and promotion rules are applied by the consumer of these
//! descriptors, not here; this module only exposes the raw shape.

use std::any::TypeId;

use crate::codec::Marshal;
use crate::unmarshal::Unmarshal;

/// A bindable leaf: anything that can be both read from and written to the wire.
pub trait Slot: Marshal + Unmarshal + Send {}

impl<T: Marshal + Unmarshal + Send> Slot for T {}

/// Per-field encoding hints declared with `#[binding(...)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// An empty value is treated as absent on output.
    pub omit_empty: bool,
    /// Scalars are emitted as the wire `string` variant.
    pub as_string: bool,
}

/// Promotion target of an embedded field.
#[derive(Debug, Clone, Copy)]
pub struct Embedded {
    pub type_id: TypeId,
    pub fields: fn() -> Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    /// External name derived from the field identifier (`string_data` → `StringData`).
    pub name: &'static str,
    /// Explicit binding name, if any.
    pub tag: Option<&'static str>,
    pub type_name: &'static str,
    pub hints: Hints,
    /// Set for untagged embedded records.
    pub embedded: Option<Embedded>,
}

impl FieldDecl {
    pub fn leaf<T: Slot>(name: &'static str, tag: Option<&'static str>, hints: Hints) -> Self {
        Self {
            name,
            tag,
            type_name: std::any::type_name::<T>(),
            hints,
            embedded: None,
        }
    }

    pub fn embedded<T: Record>(name: &'static str) -> Self {
        Self {
            name,
            tag: None,
            type_name: std::any::type_name::<T>(),
            hints: Hints::default(),
            embedded: Some(Embedded {
                type_id: T::record_type(),
                fields: T::fields,
            }),
        }
    }
}

/// A structured type with addressable bindable fields.
pub trait Record: Send + 'static {
    fn fields() -> Vec<FieldDecl>
    where
        Self: Sized;

    /// Identity used to detect repeated embedding of the same record.
    fn record_type() -> TypeId
    where
        Self: Sized,
    {
        TypeId::of::<Self>()
    }

    fn slot(&self, path: &[usize]) -> Option<&dyn Slot>;

    fn slot_mut(&mut self, path: &[usize]) -> Option<&mut dyn Slot>;
}

/// An optional embedded record is allocated on first write and reads as absent
/// while unset.
impl<T: Record + Default> Record for Option<T> {
    fn fields() -> Vec<FieldDecl> {
        T::fields()
    }

    fn record_type() -> TypeId {
        T::record_type()
    }

    fn slot(&self, path: &[usize]) -> Option<&dyn Slot> {
        self.as_ref()?.slot(path)
    }

    fn slot_mut(&mut self, path: &[usize]) -> Option<&mut dyn Slot> {
        self.get_or_insert_with(T::default).slot_mut(path)
    }
}

impl<T: Record> Record for Box<T> {
    fn fields() -> Vec<FieldDecl> {
        T::fields()
    }

    fn record_type() -> TypeId {
        T::record_type()
    }

    fn slot(&self, path: &[usize]) -> Option<&dyn Slot> {
        (**self).slot(path)
    }

    fn slot_mut(&mut self, path: &[usize]) -> Option<&mut dyn Slot> {
        (**self).slot_mut(path)
    }
}
