//! Request decoding driven by a [`StructDescriptor`].
//!
//! For every described field the [`Decoder`] locates the raw wire value (query pairs, path
//! segment, header, cookie or the body), applies the parameter style, coerces scalars and stores
//! the result under the field's destination key in [`DecodedValues`]. Failures are collected per
//! field and returned together as [`DecodeErrors`]; a missing optional value simply leaves its key
//! out.

mod body;
mod coerce;
mod parser;

pub use parser::DocumentFormat;
pub use parser::DocumentParser;
pub use parser::DocumentParsers;
pub use parser::FormParser;
pub use parser::JsonParser;
pub use parser::XmlParser;

#[cfg(test)]
pub use parser::MockDocumentParser;

use crate::error::{DecodeError, DecodeErrors, ValueError};
use crate::request::{PathParams, RawRequest, RequestBody};
use crate::schema::{FieldDescriptor, Location, Metadata, ParameterAnnotation, StructDescriptor, Style};
use crate::style::{self, Serialization, Shape};
use bytes::Bytes;
use http::HeaderMap;
use http_body_util::{BodyExt, Full};
use indexmap::IndexMap;
use mime::Mime;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Default limit of a buffered body, 2 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Upper bound of a buffered body, a whole multipart stream included.
    pub max_body_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { max_body_size: DEFAULT_MAX_BODY_SIZE }
    }
}

/// One uploaded `multipart/form-data` file.
///
/// The part is buffered while the multipart stream is read, bounded by
/// [`DecoderConfig::max_body_size`]; [`into_body`](Self::into_body) hands it back as a body.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    file_name: Option<String>,
    content_type: Option<Mime>,
    data: Bytes,
}

impl UploadFile {
    /// Creates an upload of part `name` holding `data`.
    pub fn new(name: impl Into<String>, file_name: Option<String>, content_type: Option<Mime>, data: Bytes) -> Self {
        Self { name: name.into(), file_name, content_type, data }
    }

    /// The form field name of the part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `filename` of the part's `Content-Disposition`, if sent.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's own `Content-Type`.
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The buffered content.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Reopens the uploaded content as a body.
    pub fn into_body(self) -> RequestBody {
        Full::new(self.data).map_err(|never| match never {}).boxed()
    }
}

/// A value that bypasses serde and is handed to [`Reflect::attach_payload`](crate::schema::Reflect::attach_payload).
pub enum Payload {
    Bytes(Bytes),
    Stream(RequestBody),
    File(UploadFile),
    Files(Vec<UploadFile>),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Stream(_) => "stream",
            Payload::File(_) => "file",
            Payload::Files(_) => "files",
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<RequestBody> {
        match self {
            Payload::Stream(body) => Some(body),
            _ => None,
        }
    }

    pub fn into_file(self) -> Option<UploadFile> {
        match self {
            Payload::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn into_files(self) -> Option<Vec<UploadFile>> {
        match self {
            Payload::Files(files) => Some(files),
            Payload::File(file) => Some(vec![file]),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Stream(_) => f.write_str("Stream"),
            Payload::File(file) => f.debug_tuple("File").field(file).finish(),
            Payload::Files(files) => f.debug_tuple("Files").field(files).finish(),
        }
    }
}

#[derive(Debug)]
pub enum DecodedValue {
    Value(Value),
    Payload(Payload),
    /// the parts of a multipart body, keyed like a nested record
    Record(DecodedValues),
}

impl DecodedValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DecodedValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            DecodedValue::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&DecodedValues> {
        match self {
            DecodedValue::Record(values) => Some(values),
            _ => None,
        }
    }
}

/// Decoded values keyed by destination, in field declaration order.
#[derive(Debug, Default)]
pub struct DecodedValues {
    inner: IndexMap<String, DecodedValue>,
}

impl DecodedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the value it replaces.
    pub fn insert(&mut self, key: impl Into<String>, value: DecodedValue) -> Option<DecodedValue> {
        self.inner.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&DecodedValue> {
        self.inner.get(key)
    }

    /// Removes `key`, keeping the order of the remaining values.
    pub fn remove(&mut self, key: &str) -> Option<DecodedValue> {
        self.inner.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Destination keys in field declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodedValue)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl IntoIterator for DecodedValues {
    type Item = (String, DecodedValue);
    type IntoIter = indexmap::map::IntoIter<String, DecodedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

/// Everything parameters are read from, gathered once per request.
struct Sources<'a> {
    query: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    /// comma joined values of the headers some parameter reads
    headers: HashMap<&'a str, String>,
    path: &'a PathParams,
}

impl<'a> Sources<'a> {
    fn read<R: RawRequest + ?Sized>(
        req: &R,
        path: &'a PathParams,
        descriptor: &'a StructDescriptor,
    ) -> Result<Self, DecodeError> {
        let query = match req.query() {
            Some(query) => serde_urlencoded::from_str(query)?,
            None => Vec::new(),
        };
        let headers = descriptor
            .fields()
            .iter()
            .filter_map(FieldDescriptor::parameter)
            .filter(|parameter| parameter.location == Location::Header)
            .filter_map(|parameter| {
                let name = parameter.name.as_str();
                joined_header(req.headers(), name).map(|value| (name, value))
            })
            .collect();
        Ok(Self { query, cookies: req.cookies(), headers, path })
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

fn joined_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect();
    (!values.is_empty()).then(|| values.join(","))
}

/// Reads the fields of a [`StructDescriptor`] out of a request.
///
/// Nested record types met while coercing are resolved through the shared [`Metadata`].
pub struct Decoder {
    metadata: Arc<Metadata>,
    parsers: DocumentParsers,
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a decoder with the default document parsers and body limit.
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self { metadata, parsers: DocumentParsers::default(), config: DecoderConfig::default() }
    }

    /// Replaces the document parsers used for `structured` bodies.
    #[must_use]
    pub fn with_parsers(mut self, parsers: DocumentParsers) -> Self {
        self.parsers = parsers;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn parsers(&self) -> &DocumentParsers {
        &self.parsers
    }

    /// The limits bodies are read with.
    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    /// Decodes every field of `descriptor` from `req`.
    ///
    /// The body, if a field asks for one, is taken out of the request.
    pub async fn decode<R: RawRequest + ?Sized>(
        &self,
        req: &mut R,
        params: &PathParams,
        descriptor: &StructDescriptor,
    ) -> Result<DecodedValues, DecodeErrors> {
        let sources = Sources::read(req, params, descriptor)?;
        let claimed = claimed_query_names(descriptor);

        let mut values = DecodedValues::new();
        let mut errors = Vec::new();
        for field in descriptor.fields() {
            if let Some(parameter) = field.parameter() {
                match self.decode_parameter(&sources, &claimed, field, parameter) {
                    Ok(Some(value)) => {
                        trace!(field = field.name(), dest = %parameter.dest, "decoded parameter");
                        values.insert(parameter.dest.clone(), DecodedValue::Value(value));
                    }
                    Ok(None) if parameter.required => errors.push(DecodeError::MissingParameter {
                        field: field.name(),
                        name: parameter.name.clone(),
                        location: parameter.location,
                    }),
                    Ok(None) => trace!(field = field.name(), "optional parameter absent"),
                    Err(error) => errors.push(error),
                }
            }

            if let Some(annotation) = field.body() {
                match body::decode_body(self, req, field, annotation).await {
                    Ok(Some(value)) => {
                        trace!(field = field.name(), kind = %annotation.kind, "decoded body");
                        values.insert(annotation.dest.clone(), value);
                    }
                    Ok(None) if annotation.required => {
                        errors.push(DecodeError::MissingBody { field: field.name(), kind: annotation.kind });
                    }
                    Ok(None) => trace!(field = field.name(), "optional body absent"),
                    Err(source) => errors.push(DecodeError::Body { field: field.name(), kind: annotation.kind, source }),
                }
            }
        }

        if errors.is_empty() { Ok(values) } else { Err(DecodeErrors::new(errors)) }
    }

    fn decode_parameter(
        &self,
        sources: &Sources<'_>,
        claimed: &HashSet<&str>,
        field: &FieldDescriptor,
        parameter: &ParameterAnnotation,
    ) -> Result<Option<Value>, DecodeError> {
        let Some(shape) = field.value_type().shape() else {
            // uploaded files are only read from multipart parts
            return Ok(None);
        };
        let invalid = |source: ValueError| DecodeError::InvalidParameter {
            field: field.name(),
            name: parameter.name.clone(),
            location: parameter.location,
            source,
        };

        let serialization = Serialization::from(parameter);
        let name = parameter.name.as_str();
        let raw = match parameter.location {
            Location::Query if is_catch_all(parameter, shape) => {
                let unclaimed: Vec<(String, String)> = sources
                    .query
                    .iter()
                    .filter(|(key, _)| !claimed.contains(key.split_once('[').map_or(key.as_str(), |(head, _)| head)))
                    .cloned()
                    .collect();
                style::decode_pairs(&unclaimed, name, serialization, shape)
            }
            Location::Query => style::decode_pairs(&sources.query, name, serialization, shape),
            Location::Cookie => style::decode_pairs(&sources.cookies, name, serialization, shape),
            Location::Path => sources.path.get(name).map(|raw| style::decode_str(raw, name, serialization, shape)).transpose(),
            Location::Header => {
                sources.header(name).map(|raw| style::decode_str(raw, name, serialization, shape)).transpose()
            }
        }
        .map_err(|source| invalid(source.into()))?;

        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        coerce::coerce(&self.metadata, raw, field.value_type()).map(Some).map_err(invalid)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder").field("metadata", &self.metadata).field("config", &self.config).finish_non_exhaustive()
    }
}

/// An exploded form object has no name on the wire and takes the query pairs nothing else claims.
fn is_catch_all(parameter: &ParameterAnnotation, shape: Shape) -> bool {
    parameter.style == Style::Form && parameter.explode && shape == Shape::Object
}

fn claimed_query_names(descriptor: &StructDescriptor) -> HashSet<&str> {
    descriptor
        .fields()
        .iter()
        .filter_map(|field| field.parameter().map(|parameter| (field, parameter)))
        .filter(|(field, parameter)| {
            parameter.location == Location::Query
                && !field.value_type().shape().is_some_and(|shape| is_catch_all(parameter, shape))
        })
        .map(|(_, parameter)| parameter.name.as_str())
        .collect()
}
