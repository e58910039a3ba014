//! The two built-in annotation namespaces: `parameter` and `body`.
//!
//! # Parameter syntax
//!
//! `"<name>[,location=query|path|header|cookie][,style=<style>][,explode[=bool]][,required[=bool]][,dest=<key>]"`
//!
//! An empty name means the field name, a lone `-` excludes the field. Unset options take the
//! defaults of the location: see [`Location::default_style`] and [`Style::default_explode`].
//!
//! # Body syntax
//!
//! `"<structured|file|multipart>[,dest=<key>][,required[=bool]]"`, the kind defaults to `structured`.

use crate::error::AnnotationError;
use crate::schema::reflect::{FieldInfo, ValueType};
use crate::schema::registry::{Annotation, TagParser};
use crate::style::Shape;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const PARAMETER: &str = "parameter";
pub const BODY: &str = "body";

const EXCLUDE: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Query,
    Path,
    Header,
    Cookie,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Location::Query => "query",
            Location::Path => "path",
            Location::Header => "header",
            Location::Cookie => "cookie",
        }
    }

    pub fn allowed_styles(self) -> &'static [Style] {
        match self {
            Location::Query => &[Style::Form, Style::SpaceDelimited, Style::PipeDelimited, Style::DeepObject],
            Location::Path => &[Style::Simple, Style::Label, Style::Matrix],
            Location::Header => &[Style::Simple],
            Location::Cookie => &[Style::Form],
        }
    }

    pub fn allows(self, style: Style) -> bool {
        self.allowed_styles().contains(&style)
    }

    pub fn default_style(self) -> Style {
        match self {
            Location::Query | Location::Cookie => Style::Form,
            Location::Path | Location::Header => Style::Simple,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Location::Query),
            "path" => Ok(Location::Path),
            "header" => Ok(Location::Header),
            "cookie" => Ok(Location::Cookie),
            other => Err(AnnotationError::UnknownLocation(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
    Simple,
    Label,
    Matrix,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Style::Form => "form",
            Style::SpaceDelimited => "spaceDelimited",
            Style::PipeDelimited => "pipeDelimited",
            Style::DeepObject => "deepObject",
            Style::Simple => "simple",
            Style::Label => "label",
            Style::Matrix => "matrix",
        }
    }

    /// `form` and `deepObject` explode by default, everything else does not.
    pub fn default_explode(self) -> bool {
        matches!(self, Style::Form | Style::DeepObject)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(Style::Form),
            "spaceDelimited" => Ok(Style::SpaceDelimited),
            "pipeDelimited" => Ok(Style::PipeDelimited),
            "deepObject" => Ok(Style::DeepObject),
            "simple" => Ok(Style::Simple),
            "label" => Ok(Style::Label),
            "matrix" => Ok(Style::Matrix),
            other => Err(AnnotationError::UnknownStyle(other.to_owned())),
        }
    }
}

/// Parsed `parameter` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAnnotation {
    /// name on the wire
    pub name: String,
    /// key in the decoded value collection
    pub dest: String,
    pub location: Location,
    pub style: Style,
    pub explode: bool,
    pub required: bool,
}

impl ParameterAnnotation {
    /// The implicit annotation of an untagged field: an optional, exploded form query parameter.
    pub fn query(field_name: &str) -> Self {
        Self {
            name: field_name.to_owned(),
            dest: field_name.to_owned(),
            location: Location::Query,
            style: Style::Form,
            explode: true,
            required: false,
        }
    }

    /// Parses `raw`, returning `None` when the field is excluded with `-`.
    pub fn parse(field: &FieldInfo, raw: &str) -> Result<Option<Self>, AnnotationError> {
        let raw = raw.trim();
        if raw == EXCLUDE {
            return Ok(None);
        }

        let mut parts = raw.split(',').map(str::trim);
        let name = parts.next().filter(|name| !name.is_empty()).unwrap_or(field.name);

        let mut location = Location::Query;
        let mut style = None;
        let mut explode = None;
        let mut required = None;
        let mut dest = None;
        for (key, value) in options(parts) {
            match key {
                "location" | "in" => location = require_value(key, value)?.parse()?,
                "style" => style = Some(require_value(key, value)?.parse::<Style>()?),
                "explode" => explode = Some(parse_flag(key, value)?),
                "required" => required = Some(parse_flag(key, value)?),
                "dest" => dest = Some(require_value(key, value)?.to_owned()),
                _ => return Err(AnnotationError::unknown_option(key)),
            }
        }

        let value_type = field.value_type.unwrap_or(ValueType::Any);
        if matches!(value_type, ValueType::Bytes | ValueType::Stream) {
            return Err(AnnotationError::PayloadParameter { value_type: value_type.kind_name() });
        }

        let style = style.unwrap_or_else(|| location.default_style());
        if !location.allows(style) {
            return Err(AnnotationError::style_not_allowed(location, style));
        }
        if style == Style::DeepObject && value_type.shape() != Some(Shape::Object) {
            return Err(AnnotationError::DeepObjectShape { value_type: value_type.kind_name() });
        }

        let required = match (location, required) {
            (Location::Path, Some(false)) => return Err(AnnotationError::OptionalPath),
            (Location::Path, _) => true,
            (_, required) => required.unwrap_or(false),
        };

        Ok(Some(Self {
            name: name.to_owned(),
            dest: dest.unwrap_or_else(|| field.name.to_owned()),
            location,
            style,
            explode: explode.unwrap_or_else(|| style.default_explode()),
            required,
        }))
    }
}

/// How a `file` body is handed to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadMode {
    /// read up to the body limit into a `Bytes`
    Buffered,
    /// pass the live body through without reading it
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Structured,
    File(PayloadMode),
    Multipart,
}

impl BodyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Structured => "structured",
            BodyKind::File(_) => "file",
            BodyKind::Multipart => "multipart",
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `body` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyAnnotation {
    pub dest: String,
    pub kind: BodyKind,
    pub required: bool,
}

impl BodyAnnotation {
    /// Parses `raw`, returning `None` when the field is excluded with `-`.
    ///
    /// The payload mode of a `file` body follows the field type: `Bytes` is buffered and
    /// `Stream` is passed through.
    pub fn parse(field: &FieldInfo, raw: &str) -> Result<Option<Self>, AnnotationError> {
        let raw = raw.trim();
        if raw == EXCLUDE {
            return Ok(None);
        }

        let mut parts = raw.split(',').map(str::trim);
        let kind = parts.next().unwrap_or_default();
        let value_type = field.value_type.unwrap_or(ValueType::Any);
        let kind = match (kind, value_type) {
            ("" | "structured", value_type) if !value_type.is_payload() => BodyKind::Structured,
            ("" | "structured", _) => return Err(AnnotationError::body_type("structured", "a non payload")),
            ("file", ValueType::Bytes) => BodyKind::File(PayloadMode::Buffered),
            ("file", ValueType::Stream) => BodyKind::File(PayloadMode::Streaming),
            ("file", _) => return Err(AnnotationError::body_type("file", "a bytes or stream")),
            ("multipart", ValueType::Record(_)) => BodyKind::Multipart,
            ("multipart", _) => return Err(AnnotationError::body_type("multipart", "a record")),
            (other, _) => return Err(AnnotationError::UnknownBodyKind(other.to_owned())),
        };

        let mut dest = None;
        let mut required = false;
        for (key, value) in options(parts) {
            match key {
                "dest" => dest = Some(require_value(key, value)?.to_owned()),
                "required" => required = parse_flag(key, value)?,
                _ => return Err(AnnotationError::unknown_option(key)),
            }
        }

        Ok(Some(Self { dest: dest.unwrap_or_else(|| field.name.to_owned()), kind, required }))
    }
}

/// The `parameter` namespace, including the implicit query parameter for untagged fields.
pub fn parameter_parser() -> TagParser {
    TagParser::new(|field, _position, raw| {
        let parsed = ParameterAnnotation::parse(field, raw)?;
        Ok(parsed.map(|annotation| Arc::new(annotation) as Annotation))
    })
    .with_default(default_parameter)
}

/// The `body` namespace.
pub fn body_parser() -> TagParser {
    TagParser::new(|field, _position, raw| {
        let parsed = BodyAnnotation::parse(field, raw)?;
        Ok(parsed.map(|annotation| Arc::new(annotation) as Annotation))
    })
}

fn default_parameter(field: &FieldInfo, _position: usize) -> Option<Annotation> {
    if field.embedded || field.tag_for(BODY).is_some() {
        return None;
    }
    match field.value_type {
        Some(value_type) if !value_type.is_payload() => Some(Arc::new(ParameterAnnotation::query(field.name))),
        _ => None,
    }
}

fn options<'a>(parts: impl Iterator<Item = &'a str>) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
    parts.filter(|option| !option.is_empty()).map(|option| match option.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (option, None),
    })
}

fn require_value<'a>(option: &str, value: Option<&'a str>) -> Result<&'a str, AnnotationError> {
    value.filter(|value| !value.is_empty()).ok_or_else(|| AnnotationError::missing_value(option))
}

fn parse_flag(option: &str, value: Option<&str>) -> Result<bool, AnnotationError> {
    match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(AnnotationError::invalid_flag(option, other)),
    }
}
