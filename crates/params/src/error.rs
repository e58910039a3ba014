use crate::decode::DocumentFormat;
use crate::schema::{BodyKind, Location, ScalarKind, Style};
use crate::style::Shape;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("unknown option '{option}'")]
    UnknownOption { option: String },

    #[error("option '{option}' requires a value")]
    MissingValue { option: String },

    #[error("invalid boolean '{value}' for option '{option}'")]
    InvalidFlag { option: String, value: String },

    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    #[error("unknown style '{0}'")]
    UnknownStyle(String),

    #[error("unknown body kind '{0}'")]
    UnknownBodyKind(String),

    #[error("style '{style}' is not allowed in {location}, expected one of: {allowed}")]
    StyleNotAllowed { location: Location, style: Style, allowed: String },

    #[error("style 'deepObject' requires an object or record field, found {value_type}")]
    DeepObjectShape { value_type: &'static str },

    #[error("path parameters are always required")]
    OptionalPath,

    #[error("{value_type} fields can not be read from a parameter")]
    PayloadParameter { value_type: &'static str },

    #[error("{kind} body requires {expected} field")]
    BodyType { kind: &'static str, expected: &'static str },
}

impl AnnotationError {
    pub fn unknown_option<S: ToString>(option: S) -> Self {
        Self::UnknownOption { option: option.to_string() }
    }

    pub fn missing_value<S: ToString>(option: S) -> Self {
        Self::MissingValue { option: option.to_string() }
    }

    pub fn invalid_flag<S: ToString, V: ToString>(option: S, value: V) -> Self {
        Self::InvalidFlag { option: option.to_string(), value: value.to_string() }
    }

    pub fn style_not_allowed(location: Location, style: Style) -> Self {
        let allowed = location.allowed_styles().iter().map(|style| style.as_str()).collect::<Vec<_>>().join(", ");
        Self::StyleNotAllowed { location, style, allowed }
    }

    pub fn body_type(kind: &'static str, expected: &'static str) -> Self {
        Self::BodyType { kind, expected }
    }
}

/// One problem found while validating a declared field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("field name cannot be empty")]
    EmptyName,

    #[error("value type cannot be missing")]
    MissingType,

    #[error("index must be non-negative, got {index}")]
    NegativeIndex { index: isize },
}

/// Every violation of one field, displayed joined by `"; "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self(violations)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.0, "; ")
    }
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("invalid field '{field}' in {record}: {violations}")]
    InvalidField { record: &'static str, field: &'static str, violations: Violations },

    #[error("invalid '{namespace}' annotation on field '{field}' in {record}: {source}")]
    Annotation { record: &'static str, field: &'static str, namespace: &'static str, source: BoxError },

    #[error("embedded field '{field}' in {record} is not a record")]
    EmbeddedNotRecord { record: &'static str, field: &'static str },

    #[error("{record} embeds itself through field '{field}'")]
    RecursiveEmbedding { record: &'static str, field: &'static str },

    #[error("field '{field}' is declared twice at the same depth of {record}")]
    DuplicateField { record: &'static str, field: &'static str },

    #[error("{record} declares more than one body field: '{first}' and '{second}'")]
    MultipleBodies { record: &'static str, first: &'static str, second: &'static str },

    #[error("fields '{first}' and '{second}' of {record} both decode into '{dest}'")]
    DuplicateDest { record: &'static str, dest: String, first: &'static str, second: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    #[error("style '{style}' can not be used in {location}")]
    UnsupportedStyle { location: Location, style: Style },

    #[error("style '{style}' can not carry {shape} values")]
    UnsupportedShape { style: Style, shape: Shape },

    #[error("expected '{expected}' prefix in '{raw}'")]
    MissingPrefix { expected: String, raw: String },

    #[error("unterminated bracket in '{raw}'")]
    UnterminatedBracket { raw: String },

    #[error("odd number of key/value elements in '{raw}'")]
    OddPairs { raw: String },

    #[error("malformed key/value pair '{raw}'")]
    MalformedPair { raw: String },

    #[error("'{raw}' is not a valid {kind}")]
    InvalidScalar { kind: ScalarKind, raw: String },

    #[error("invalid percent-encoding in '{raw}'")]
    InvalidEncoding { raw: String },
}

impl StyleError {
    pub fn missing_prefix<E: ToString, R: ToString>(expected: E, raw: R) -> Self {
        Self::MissingPrefix { expected: expected.to_string(), raw: raw.to_string() }
    }

    pub fn unterminated_bracket<S: ToString>(raw: S) -> Self {
        Self::UnterminatedBracket { raw: raw.to_string() }
    }

    pub fn odd_pairs<S: ToString>(raw: S) -> Self {
        Self::OddPairs { raw: raw.to_string() }
    }

    pub fn malformed_pair<S: ToString>(raw: S) -> Self {
        Self::MalformedPair { raw: raw.to_string() }
    }

    pub fn invalid_scalar<S: ToString>(kind: ScalarKind, raw: S) -> Self {
        Self::InvalidScalar { kind, raw: raw.to_string() }
    }
}

/// Failure to turn raw wire text into a typed value.
#[derive(Error, Debug)]
pub enum ValueError {
    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("unsupported content type '{content_type}', expected {expected}")]
    UnsupportedContentType { content_type: String, expected: &'static str },

    #[error("body exceeds the limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read body: {source}")]
    Read { source: BoxError },

    #[error("request body has already been consumed")]
    Consumed,

    #[error("malformed {format} document: {source}")]
    Document { format: DocumentFormat, source: BoxError },

    #[error("multipart error: {source}")]
    Multipart {
        #[from]
        source: multer::Error,
    },

    #[error("missing required part '{part}'")]
    MissingPart { part: String },

    #[error("invalid part '{part}': {source}")]
    InvalidPart { part: String, source: ValueError },

    #[error("{value_type} field can not receive a {kind} body")]
    InvalidDestination { kind: BodyKind, value_type: &'static str },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl BodyError {
    pub fn unsupported_content_type<S: ToString>(content_type: S, expected: &'static str) -> Self {
        Self::UnsupportedContentType { content_type: content_type.to_string(), expected }
    }

    pub fn read(source: BoxError, limit: usize) -> Self {
        if source.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
            Self::TooLarge { limit }
        } else {
            Self::Read { source }
        }
    }

    pub fn document(format: DocumentFormat, source: BoxError) -> Self {
        Self::Document { format, source }
    }

    pub fn missing_part<S: ToString>(part: S) -> Self {
        Self::MissingPart { part: part.to_string() }
    }

    pub fn invalid_part<S: ToString, E: Into<ValueError>>(part: S, source: E) -> Self {
        Self::InvalidPart { part: part.to_string(), source: source.into() }
    }
}

/// A failure attributed to one field of the record being decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("missing required {location} parameter '{name}' for field '{field}'")]
    MissingParameter { field: &'static str, name: String, location: Location },

    #[error("invalid {location} parameter '{name}' for field '{field}': {source}")]
    InvalidParameter { field: &'static str, name: String, location: Location, source: ValueError },

    #[error("malformed query string: {source}")]
    MalformedQuery {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    #[error("missing required {kind} body for field '{field}'")]
    MissingBody { field: &'static str, kind: BodyKind },

    #[error("invalid {kind} body for field '{field}': {source}")]
    Body { field: &'static str, kind: BodyKind, source: BodyError },
}

impl DecodeError {
    /// The record field the failure belongs to, `None` for request wide failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecodeError::MissingParameter { field, .. }
            | DecodeError::InvalidParameter { field, .. }
            | DecodeError::MissingBody { field, .. }
            | DecodeError::Body { field, .. } => Some(*field),
            DecodeError::MalformedQuery { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DecodeError::MissingParameter { .. } | DecodeError::MissingBody { .. })
    }
}

/// Every field failure of one decode, in declaration order.
#[derive(Debug)]
pub struct DecodeErrors {
    errors: Vec<DecodeError>,
}

impl DecodeErrors {
    pub fn new(errors: Vec<DecodeError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecodeError> {
        self.errors.iter()
    }

    /// The failure of `field`, if it has one.
    pub fn for_field(&self, field: &str) -> Option<&DecodeError> {
        self.errors.iter().find(|error| error.field() == Some(field))
    }

    pub fn into_vec(self) -> Vec<DecodeError> {
        self.errors
    }
}

impl From<DecodeError> for DecodeErrors {
    fn from(error: DecodeError) -> Self {
        Self { errors: vec![error] }
    }
}

impl fmt::Display for DecodeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        join(f, &self.errors, "; ")
    }
}

impl std::error::Error for DecodeErrors {}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("no field accepts a payload at '{path}'")]
    Unexpected { path: String },

    #[error("field '{path}' expects a {expected} payload")]
    Mismatch { path: String, expected: &'static str },
}

impl PayloadError {
    pub fn unexpected(path: &[&str]) -> Self {
        Self::Unexpected { path: path.join(".") }
    }

    pub fn mismatch(path: &[&str], expected: &'static str) -> Self {
        Self::Mismatch { path: path.join("."), expected }
    }
}

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("failed to deserialize decoded values: {source}")]
    Deserialize {
        #[from]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Custom(BoxError),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("metadata error: {source}")]
    Metadata {
        #[from]
        source: MetadataError,
    },

    #[error("decode error: {source}")]
    Decode {
        #[from]
        source: DecodeErrors,
    },

    #[error("materialize error: {source}")]
    Materialize {
        #[from]
        source: MaterializeError,
    },
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full, Limited};

    #[test]
    fn violations_are_joined() {
        let violations = Violations::new(vec![Violation::EmptyName, Violation::NegativeIndex { index: -2 }]);
        assert_eq!(violations.to_string(), "field name cannot be empty; index must be non-negative, got -2");
    }

    #[test]
    fn decode_errors_keep_order_and_field() {
        let errors = DecodeErrors::new(vec![
            DecodeError::MissingParameter { field: "id", name: "id".into(), location: Location::Path },
            DecodeError::MissingBody { field: "payload", kind: BodyKind::Structured },
        ]);

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "missing required path parameter 'id' for field 'id'; missing required structured body for field 'payload'"
        );
        assert!(errors.for_field("payload").is_some_and(DecodeError::is_missing));
        assert!(errors.for_field("limit").is_none());
    }

    #[tokio::test]
    async fn length_limit_maps_to_too_large() {
        let body = Limited::new(Full::new(Bytes::from_static(b"0123456789")), 4);
        let source = body.collect().await.unwrap_err();
        let err = BodyError::read(source, 4);
        assert!(matches!(err, BodyError::TooLarge { limit: 4 }));

        let err = BodyError::read("connection reset".into(), 16);
        assert_eq!(err.to_string(), "failed to read body: connection reset");
    }

    #[test]
    fn style_not_allowed_lists_alternatives() {
        let err = AnnotationError::style_not_allowed(Location::Path, Style::Form);
        assert_eq!(err.to_string(), "style 'form' is not allowed in path, expected one of: simple, label, matrix");
    }
}
