use crate::error::BoxError;
use mime::Mime;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Document formats a structured body can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Json,
    Xml,
    Form,
}

impl DocumentFormat {
    /// Picks the format from the content type; unknown or missing types fall back to json.
    pub fn detect(content_type: Option<&Mime>) -> Self {
        let Some(mime) = content_type else {
            debug!("no content type, decode body as json");
            return DocumentFormat::Json;
        };

        if mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON) {
            DocumentFormat::Json
        } else if mime.subtype() == mime::XML || mime.suffix() == Some(mime::XML) {
            DocumentFormat::Xml
        } else if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
            DocumentFormat::Form
        } else {
            debug!(content_type = %mime, "unrecognized content type, decode body as json");
            DocumentFormat::Json
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Xml => "xml",
            DocumentFormat::Form => "form",
        })
    }
}

/// Turns a complete body into a json value tree.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Value, BoxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value, BoxError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `application/x-www-form-urlencoded`, with bracketed keys building nested objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormParser;

impl DocumentParser for FormParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value, BoxError> {
        Ok(serde_qs::from_bytes(bytes)?)
    }
}

/// Maps an xml document onto a json tree.
///
/// The root element itself is unwrapped. Attributes become `@name` keys, an element holding only
/// text becomes a string, mixed text is stored under `#text` and repeated elements become arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

struct Element {
    name: String,
    node: Map<String, Value>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, BoxError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut node = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = format!("@{}", String::from_utf8_lossy(attribute.key.as_ref()));
            node.insert(key, Value::String(attribute.unescape_value()?.into_owned()));
        }
        Ok(Self { name, node, text: String::new() })
    }

    fn close(self) -> (String, Value) {
        let Element { name, mut node, text } = self;
        let value = match (node.is_empty(), text.is_empty()) {
            (true, true) => Value::Null,
            (true, false) => Value::String(text),
            (false, true) => Value::Object(node),
            (false, false) => {
                node.insert("#text".to_owned(), Value::String(text));
                Value::Object(node)
            }
        };
        (name, value)
    }
}

fn append(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

impl DocumentParser for XmlParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value, BoxError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        loop {
            let closed = match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(Element::open(&start)?);
                    None
                }
                Event::Empty(start) => Some(Element::open(&start)?.close()),
                Event::End(_) => stack.pop().map(Element::close),
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                    None
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                    None
                }
                Event::Eof => break,
                _ => None,
            };

            if let Some((name, value)) = closed {
                match stack.last_mut() {
                    Some(parent) => append(&mut parent.node, name, value),
                    None => return Ok(value),
                }
            }
        }
        Err("xml document has no root element".into())
    }
}

/// The parser of every [`DocumentFormat`].
pub struct DocumentParsers {
    json: Box<dyn DocumentParser>,
    xml: Box<dyn DocumentParser>,
    form: Box<dyn DocumentParser>,
}

impl DocumentParsers {
    pub fn new() -> Self {
        Self { json: Box::new(JsonParser), xml: Box::new(XmlParser), form: Box::new(FormParser) }
    }

    #[must_use]
    pub fn with_json(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.json = Box::new(parser);
        self
    }

    #[must_use]
    pub fn with_xml(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.xml = Box::new(parser);
        self
    }

    #[must_use]
    pub fn with_form(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.form = Box::new(parser);
        self
    }

    pub fn parse(&self, format: DocumentFormat, bytes: &[u8]) -> Result<Value, BoxError> {
        match format {
            DocumentFormat::Json => self.json.parse(bytes),
            DocumentFormat::Xml => self.xml.parse(bytes),
            DocumentFormat::Form => self.form.parse(bytes),
        }
    }
}

impl Default for DocumentParsers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentParsers").finish_non_exhaustive()
    }
}
