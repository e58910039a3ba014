//! Record metadata: self-described fields, annotation namespaces and the descriptor cache.
//!
//! The flow is [`Reflect::fields`] → [`TagRegistry`] parses annotations per namespace →
//! [`StructDescriptor`] cached by [`Metadata`] for the lifetime of the process.

mod annotation;
mod cache;
mod metadata;
mod reflect;
mod registry;

pub use annotation::BODY;
pub use annotation::BodyAnnotation;
pub use annotation::BodyKind;
pub use annotation::Location;
pub use annotation::PARAMETER;
pub use annotation::ParameterAnnotation;
pub use annotation::PayloadMode;
pub use annotation::Style;
pub use cache::Metadata;
pub use metadata::FieldDescriptor;
pub use metadata::StructDescriptor;
pub use metadata::validate_field;
pub use reflect::FieldInfo;
pub use reflect::RecordType;
pub use reflect::Reflect;
pub use reflect::ScalarKind;
pub use reflect::ValueType;
pub use registry::Annotation;
pub use registry::TagParser;
pub use registry::TagRegistry;
pub use registry::TagRegistryBuilder;
