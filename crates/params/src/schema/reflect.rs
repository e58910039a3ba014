//! Type self-description used in place of runtime reflection.
//!
//! A record type that should be decoded from a request implements [`Reflect`] and lists
//! its fields in declaration order. Each [`FieldInfo`] carries the raw annotation text per
//! namespace; interpreting that text is the job of the [`TagRegistry`](super::TagRegistry).

use crate::decode::Payload;
use crate::error::PayloadError;
use crate::style::Shape;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A record type that can describe its own fields.
///
/// # Example
/// ```
/// use micro_params::schema::{FieldInfo, Reflect, ScalarKind, ValueType};
///
/// #[derive(Default)]
/// struct GetPet {
///     id: i64,
///     fields: Vec<String>,
/// }
///
/// impl Reflect for GetPet {
///     fn fields() -> Vec<FieldInfo> {
///         vec![
///             FieldInfo::new("id", 0, ValueType::Scalar(ScalarKind::Integer)).tag("parameter", "id,location=path"),
///             FieldInfo::new("fields", 1, ValueType::Array(ScalarKind::String)).tag("parameter", "fields,explode=false"),
///         ]
///     }
/// }
///
/// assert_eq!(GetPet::fields().len(), 2);
/// ```
pub trait Reflect: 'static {
    /// Returns the fields of this record in declaration order.
    fn fields() -> Vec<FieldInfo>;

    /// Receives a payload (buffered bytes, live body stream or uploaded files) that can not be
    /// represented as a serde value. `path` is the destination key path, outermost first.
    fn attach_payload(&mut self, path: &[&str], payload: Payload) -> Result<(), PayloadError> {
        drop(payload);
        Err(PayloadError::unexpected(path))
    }
}

/// The semantic kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The static value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// a single scalar
    Scalar(ScalarKind),
    /// an ordered sequence of scalars
    Array(ScalarKind),
    /// a string keyed map of scalars
    Object(ScalarKind),
    /// a nested record, described by its own [`Reflect`] impl
    Record(RecordType),
    /// any json-like value, mostly used for structured bodies
    Any,
    /// a fully buffered body
    Bytes,
    /// a live, single pass body stream
    Stream,
    /// one uploaded multipart file
    File,
    /// repeated uploaded multipart files
    Files,
}

impl ValueType {
    /// Returns true for types that can not be represented as a serde value.
    pub fn is_payload(&self) -> bool {
        matches!(self, ValueType::Bytes | ValueType::Stream | ValueType::File | ValueType::Files)
    }

    /// The wire shape a parameter of this type is decoded into, `None` for payload types.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            ValueType::Scalar(_) | ValueType::Any => Some(Shape::Scalar),
            ValueType::Array(_) => Some(Shape::Array),
            ValueType::Object(_) | ValueType::Record(_) => Some(Shape::Object),
            ValueType::Bytes | ValueType::Stream | ValueType::File | ValueType::Files => None,
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            ValueType::Scalar(kind) | ValueType::Array(kind) | ValueType::Object(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueType::Scalar(_) => "scalar",
            ValueType::Array(_) => "array",
            ValueType::Object(_) => "object",
            ValueType::Record(_) => "record",
            ValueType::Any => "any",
            ValueType::Bytes => "bytes",
            ValueType::Stream => "stream",
            ValueType::File => "file",
            ValueType::Files => "files",
        }
    }
}

/// A copyable handle to a [`Reflect`] type, used for nested and embedded records.
#[derive(Clone, Copy)]
pub struct RecordType {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    fields: fn() -> Vec<FieldInfo>,
}

impl RecordType {
    pub fn of<T: Reflect>() -> Self {
        Self { type_id: TypeId::of::<T>, type_name: std::any::type_name::<T>, fields: T::fields }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn fields(&self) -> Vec<FieldInfo> {
        (self.fields)()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name()).finish()
    }
}

/// Unchecked description of one declared field.
///
/// The fields are public on purpose: values come from hand written [`Reflect`] impls and are
/// validated when the metadata for the record is built.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: &'static str,
    pub index: isize,
    pub embedded: bool,
    pub value_type: Option<ValueType>,
    /// `(namespace, raw annotation text)` pairs
    pub tags: Vec<(&'static str, &'static str)>,
}

impl FieldInfo {
    pub fn new(name: &'static str, index: isize, value_type: ValueType) -> Self {
        Self { name, index, embedded: false, value_type: Some(value_type), tags: Vec::new() }
    }

    /// An embedded group whose fields are promoted into the enclosing record.
    pub fn embed<T: Reflect>(name: &'static str, index: isize) -> Self {
        Self {
            name,
            index,
            embedded: true,
            value_type: Some(ValueType::Record(RecordType::of::<T>())),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn tag(mut self, namespace: &'static str, text: &'static str) -> Self {
        self.tags.push((namespace, text));
        self
    }

    /// Returns the raw annotation text for `namespace`, if the field carries one.
    pub fn tag_for(&self, namespace: &str) -> Option<&'static str> {
        self.tags.iter().find(|(ns, _)| *ns == namespace).map(|(_, text)| *text)
    }
}
