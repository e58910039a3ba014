//! OpenAPI parameter serialization: `style` and `explode` per location.
//!
//! Query and cookie parameters arrive as already decoded key/value pairs and are handled by
//! [`decode_pairs`]; path segments and header values arrive as one raw string and are handled by
//! [`decode_str`]. Path elements are split first and percent-decoded afterwards, so an encoded
//! delimiter never splits a value. Header elements are trimmed of optional whitespace.
//!
//! | location | styles                                              | default  |
//! |----------|-----------------------------------------------------|----------|
//! | query    | form, spaceDelimited, pipeDelimited, deepObject      | form     |
//! | path     | simple, label, matrix                               | simple   |
//! | header   | simple                                              | simple   |
//! | cookie   | form                                                | form     |
//!
//! [`encode_pairs`] and [`encode_str`] are the inverse operations.

use crate::error::StyleError;
use crate::schema::{Location, ParameterAnnotation, Style};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::borrow::Cow;
use std::fmt;

/// Characters escaped inside a path element, including the style delimiters.
const PATH_ELEMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b',')
    .add(b';')
    .add(b'=')
    .add(b'.');

/// The structural shape a parameter decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Array,
    Object,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Scalar => "scalar",
            Shape::Array => "array",
            Shape::Object => "object",
        })
    }
}

/// A parameter value before scalar coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    Array(Vec<String>),
    Object(IndexMap<String, String>),
}

impl ParamValue {
    pub fn shape(&self) -> Shape {
        match self {
            ParamValue::Scalar(_) => Shape::Scalar,
            ParamValue::Array(_) => Shape::Array,
            ParamValue::Object(_) => Shape::Object,
        }
    }

    /// Empty values are treated as absent by the decoder.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Scalar(raw) => raw.is_empty(),
            ParamValue::Array(items) => items.is_empty(),
            ParamValue::Object(object) => object.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Serialization {
    pub location: Location,
    pub style: Style,
    pub explode: bool,
}

impl Serialization {
    pub fn new(location: Location, style: Style, explode: bool) -> Self {
        Self { location, style, explode }
    }

    /// The default style and explode flag of `location`.
    pub fn for_location(location: Location) -> Self {
        let style = location.default_style();
        Self { location, style, explode: style.default_explode() }
    }

    fn check(self) -> Result<(), StyleError> {
        if self.location.allows(self.style) {
            Ok(())
        } else {
            Err(StyleError::UnsupportedStyle { location: self.location, style: self.style })
        }
    }
}

impl From<&ParameterAnnotation> for Serialization {
    fn from(annotation: &ParameterAnnotation) -> Self {
        Self::new(annotation.location, annotation.style, annotation.explode)
    }
}

/// Decodes parameter `name` from key/value pairs, returning `None` when it does not occur.
///
/// An exploded `form` object has no name on the wire, so every pair is taken as a property.
pub fn decode_pairs(
    pairs: &[(String, String)],
    name: &str,
    serialization: Serialization,
    shape: Shape,
) -> Result<Option<ParamValue>, StyleError> {
    serialization.check()?;
    let Serialization { location, style, explode } = serialization;

    match (style, shape) {
        (Style::DeepObject, Shape::Object) => deep_object(pairs, name),
        (Style::DeepObject, shape) => Err(StyleError::UnsupportedShape { style, shape }),
        (Style::Form | Style::SpaceDelimited | Style::PipeDelimited, shape) => {
            let delimiter = delimiter(style);
            match shape {
                Shape::Scalar => Ok(first(pairs, name).map(|raw| ParamValue::Scalar(raw.to_owned()))),
                Shape::Array if explode => {
                    let items: Vec<String> = pairs
                        .iter()
                        .filter(|(key, value)| key == name && !value.is_empty())
                        .map(|(_, value)| value.clone())
                        .collect();
                    Ok((!items.is_empty()).then_some(ParamValue::Array(items)))
                }
                Shape::Array => Ok(first(pairs, name)
                    .map(|raw| ParamValue::Array(split(raw, delimiter).map(str::to_owned).collect()))),
                Shape::Object if explode => {
                    let mut object = IndexMap::with_capacity(pairs.len());
                    for (key, value) in pairs {
                        object.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                    Ok((!object.is_empty()).then_some(ParamValue::Object(object)))
                }
                Shape::Object => first(pairs, name)
                    .map(|raw| alternating(&split(raw, delimiter).collect::<Vec<_>>(), raw, location))
                    .transpose(),
            }
        }
        _ => Err(StyleError::UnsupportedStyle { location, style }),
    }
}

/// Decodes the raw text of parameter `name` taken from a path segment or a header.
pub fn decode_str(raw: &str, name: &str, serialization: Serialization, shape: Shape) -> Result<ParamValue, StyleError> {
    serialization.check()?;
    let Serialization { location, style, explode } = serialization;

    match style {
        Style::Simple => delimited(raw, ",", explode, shape, location),
        Style::Label => {
            let body = raw.strip_prefix('.').ok_or_else(|| StyleError::missing_prefix(".", raw))?;
            delimited(body, if explode { "." } else { "," }, explode, shape, location)
        }
        Style::Matrix => matrix(raw, name, explode, shape, location),
        _ => Err(StyleError::UnsupportedStyle { location, style }),
    }
}

/// Encodes `value` into the key/value pairs of a query string or cookie header.
pub fn encode_pairs(
    name: &str,
    value: &ParamValue,
    serialization: Serialization,
) -> Result<Vec<(String, String)>, StyleError> {
    serialization.check()?;
    let Serialization { location, style, explode } = serialization;

    match (style, value) {
        (Style::DeepObject, ParamValue::Object(object)) => {
            Ok(object.iter().map(|(key, value)| (format!("{name}[{key}]"), value.clone())).collect())
        }
        (Style::DeepObject, value) => Err(StyleError::UnsupportedShape { style, shape: value.shape() }),
        (Style::Form | Style::SpaceDelimited | Style::PipeDelimited, value) => {
            let delimiter = delimiter(style);
            Ok(match value {
                ParamValue::Scalar(raw) => vec![(name.to_owned(), raw.clone())],
                ParamValue::Array(items) if explode => items.iter().map(|item| (name.to_owned(), item.clone())).collect(),
                ParamValue::Array(items) => vec![(name.to_owned(), items.join(delimiter))],
                ParamValue::Object(object) if explode => {
                    object.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
                }
                ParamValue::Object(object) if object.is_empty() => Vec::new(),
                ParamValue::Object(_) => vec![(name.to_owned(), joined(value, delimiter, false, location))],
            })
        }
        _ => Err(StyleError::UnsupportedStyle { location, style }),
    }
}

/// Encodes `value` into the raw text of a path segment or header value.
pub fn encode_str(name: &str, value: &ParamValue, serialization: Serialization) -> Result<String, StyleError> {
    serialization.check()?;
    let Serialization { location, style, explode } = serialization;

    match style {
        Style::Simple => Ok(joined(value, ",", explode, location)),
        Style::Label => Ok(format!(".{}", joined(value, if explode { "." } else { "," }, explode, location))),
        Style::Matrix => Ok(match value {
            ParamValue::Scalar(raw) if raw.is_empty() => format!(";{name}"),
            ParamValue::Array(items) if explode => {
                items.iter().map(|item| format!(";{name}={}", escape(item, location))).collect()
            }
            ParamValue::Object(object) if explode => object
                .iter()
                .map(|(key, value)| format!(";{}={}", escape(key, location), escape(value, location)))
                .collect(),
            value => format!(";{name}={}", joined(value, ",", false, location)),
        }),
        _ => Err(StyleError::UnsupportedStyle { location, style }),
    }
}

fn delimiter(style: Style) -> &'static str {
    match style {
        Style::SpaceDelimited => " ",
        Style::PipeDelimited => "|",
        _ => ",",
    }
}

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

/// Splits `body` on `delimiter`; an empty body has no elements.
fn split<'a>(body: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> {
    (!body.is_empty()).then(|| body.split(delimiter)).into_iter().flatten()
}

fn deep_object(pairs: &[(String, String)], name: &str) -> Result<Option<ParamValue>, StyleError> {
    let mut object = IndexMap::new();
    for (key, value) in pairs {
        let Some(inner) = key.strip_prefix(name).and_then(|rest| rest.strip_prefix('[')) else {
            continue;
        };
        let Some(property) = inner.strip_suffix(']') else {
            return Err(StyleError::unterminated_bracket(key));
        };
        if property.contains(['[', ']']) {
            // nested objects are not part of deepObject
            return Err(StyleError::malformed_pair(key));
        }
        object.entry(property.to_owned()).or_insert_with(|| value.clone());
    }
    Ok((!object.is_empty()).then_some(ParamValue::Object(object)))
}

fn delimited(body: &str, delimiter: &str, explode: bool, shape: Shape, location: Location) -> Result<ParamValue, StyleError> {
    match shape {
        Shape::Scalar => Ok(ParamValue::Scalar(unescape(body, location)?)),
        Shape::Array => {
            split(body, delimiter).map(|item| unescape(item, location)).collect::<Result<_, _>>().map(ParamValue::Array)
        }
        Shape::Object => {
            let items: Vec<&str> = split(body, delimiter).collect();
            if explode && items.iter().all(|item| item.contains('=')) {
                key_values(&items, location)
            } else {
                alternating(&items, body, location)
            }
        }
    }
}

fn matrix(raw: &str, name: &str, explode: bool, shape: Shape, location: Location) -> Result<ParamValue, StyleError> {
    match shape {
        // an empty exploded list expands to nothing
        Shape::Array if explode && raw.is_empty() => Ok(ParamValue::Array(Vec::new())),
        Shape::Object if explode && raw.is_empty() => Ok(ParamValue::Object(IndexMap::new())),
        Shape::Array if explode => {
            let body = raw.strip_prefix(';').ok_or_else(|| StyleError::missing_prefix(";", raw))?;
            body.split(';')
                .map(|segment| {
                    let value = segment
                        .strip_prefix(name)
                        .and_then(|rest| rest.strip_prefix('='))
                        .ok_or_else(|| StyleError::missing_prefix(format!("{name}="), segment))?;
                    unescape(value, location)
                })
                .collect::<Result<_, _>>()
                .map(ParamValue::Array)
        }
        Shape::Object if explode => {
            let body = raw.strip_prefix(';').ok_or_else(|| StyleError::missing_prefix(";", raw))?;
            key_values(&split(body, ";").collect::<Vec<_>>(), location)
        }
        shape => {
            let prefix = format!(";{name}");
            let rest = raw.strip_prefix(prefix.as_str()).ok_or_else(|| StyleError::missing_prefix(&prefix, raw))?;
            let body = match rest.strip_prefix('=') {
                Some(body) => body,
                None if rest.is_empty() => rest,
                None => return Err(StyleError::missing_prefix(format!("{prefix}="), raw)),
            };
            delimited(body, ",", false, shape, location)
        }
    }
}

/// `k=v` elements.
fn key_values(items: &[&str], location: Location) -> Result<ParamValue, StyleError> {
    let mut object = IndexMap::with_capacity(items.len());
    for item in items {
        let (key, value) = item.split_once('=').ok_or_else(|| StyleError::malformed_pair(item))?;
        let key = unescape(key, location)?;
        if !object.contains_key(&key) {
            object.insert(key, unescape(value, location)?);
        }
    }
    Ok(ParamValue::Object(object))
}

/// `k,v,k,v` elements.
fn alternating(items: &[&str], raw: &str, location: Location) -> Result<ParamValue, StyleError> {
    if items.len() % 2 != 0 {
        return Err(StyleError::odd_pairs(raw));
    }
    let mut object = IndexMap::with_capacity(items.len() / 2);
    for pair in items.chunks_exact(2) {
        let key = unescape(pair[0], location)?;
        if !object.contains_key(&key) {
            object.insert(key, unescape(pair[1], location)?);
        }
    }
    Ok(ParamValue::Object(object))
}

fn joined(value: &ParamValue, delimiter: &str, explode: bool, location: Location) -> String {
    match value {
        ParamValue::Scalar(raw) => escape(raw, location).into_owned(),
        ParamValue::Array(items) => items.iter().map(|item| escape(item, location)).collect::<Vec<_>>().join(delimiter),
        ParamValue::Object(object) if explode => object
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, location), escape(value, location)))
            .collect::<Vec<_>>()
            .join(delimiter),
        ParamValue::Object(object) => object
            .iter()
            .flat_map(|(key, value)| [escape(key, location), escape(value, location)])
            .collect::<Vec<_>>()
            .join(delimiter),
    }
}

fn unescape(raw: &str, location: Location) -> Result<String, StyleError> {
    match location {
        Location::Path => percent_decode_str(raw)
            .decode_utf8()
            .map(Cow::into_owned)
            .map_err(|_utf8| StyleError::InvalidEncoding { raw: raw.to_owned() }),
        Location::Header => Ok(raw.trim().to_owned()),
        Location::Query | Location::Cookie => Ok(raw.to_owned()),
    }
}

fn escape(raw: &str, location: Location) -> Cow<'_, str> {
    match location {
        Location::Path => Cow::from(utf8_percent_encode(raw, PATH_ELEMENT)),
        _ => Cow::Borrowed(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn array(items: &[&str]) -> ParamValue {
        ParamValue::Array(items.iter().map(|item| (*item).to_owned()).collect())
    }

    fn object(entries: &[(&str, &str)]) -> ParamValue {
        ParamValue::Object(entries.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect())
    }

    fn scalar(raw: &str) -> ParamValue {
        ParamValue::Scalar(raw.to_owned())
    }

    fn query(style: Style, explode: bool) -> Serialization {
        Serialization::new(Location::Query, style, explode)
    }

    fn path(style: Style, explode: bool) -> Serialization {
        Serialization::new(Location::Path, style, explode)
    }

    #[rstest]
    #[case(&[("ids", "1"), ("ids", "2"), ("ids", "3")], query(Style::Form, true), array(&["1", "2", "3"]))]
    #[case(&[("ids", "1,2,3")], query(Style::Form, false), array(&["1", "2", "3"]))]
    #[case(&[("ids", "1 2 3")], query(Style::SpaceDelimited, false), array(&["1", "2", "3"]))]
    #[case(&[("ids", "1|2|3")], query(Style::PipeDelimited, false), array(&["1", "2", "3"]))]
    #[case(&[("ids", "1"), ("other", "x"), ("ids", "2")], query(Style::PipeDelimited, true), array(&["1", "2"]))]
    fn query_arrays(#[case] raw: &[(&str, &str)], #[case] serialization: Serialization, #[case] expected: ParamValue) {
        let decoded = decode_pairs(&pairs(raw), "ids", serialization, Shape::Array).unwrap();
        assert_eq!(decoded, Some(expected));
    }

    #[test]
    fn query_scalar_takes_first_occurrence() {
        let raw = pairs(&[("limit", "10"), ("limit", "20")]);
        let decoded = decode_pairs(&raw, "limit", Serialization::for_location(Location::Query), Shape::Scalar).unwrap();
        assert_eq!(decoded, Some(scalar("10")));
    }

    #[test]
    fn absent_parameter_is_none() {
        let raw = pairs(&[("limit", "10")]);
        let serialization = query(Style::Form, true);
        assert_eq!(decode_pairs(&raw, "offset", serialization, Shape::Scalar).unwrap(), None);
        assert_eq!(decode_pairs(&raw, "offset", serialization, Shape::Array).unwrap(), None);
        assert_eq!(decode_pairs(&raw, "filter", query(Style::DeepObject, true), Shape::Object).unwrap(), None);
    }

    #[test]
    fn query_objects() {
        let raw = pairs(&[("color", "R,100,G,200")]);
        let decoded = decode_pairs(&raw, "color", query(Style::Form, false), Shape::Object).unwrap();
        assert_eq!(decoded, Some(object(&[("R", "100"), ("G", "200")])));

        let raw = pairs(&[("R", "100"), ("G", "200"), ("R", "0")]);
        let decoded = decode_pairs(&raw, "color", query(Style::Form, true), Shape::Object).unwrap();
        assert_eq!(decoded, Some(object(&[("R", "100"), ("G", "200")])));

        let raw = pairs(&[("color", "R,100,G")]);
        let err = decode_pairs(&raw, "color", query(Style::Form, false), Shape::Object).unwrap_err();
        assert_eq!(err, StyleError::odd_pairs("R,100,G"));
    }

    #[test]
    fn deep_object() {
        let raw = pairs(&[("filter[type]", "cat"), ("filterx[a]", "1"), ("filter[age]", "3"), ("limit", "2")]);
        let decoded = decode_pairs(&raw, "filter", query(Style::DeepObject, true), Shape::Object).unwrap();
        assert_eq!(decoded, Some(object(&[("type", "cat"), ("age", "3")])));
    }

    #[rstest]
    #[case(&[("filter[type", "cat")], Shape::Object, StyleError::unterminated_bracket("filter[type"))]
    #[case(&[("filter[a][b]", "cat")], Shape::Object, StyleError::malformed_pair("filter[a][b]"))]
    #[case(&[("filter", "cat")], Shape::Array, StyleError::UnsupportedShape { style: Style::DeepObject, shape: Shape::Array })]
    #[case(&[("filter", "cat")], Shape::Scalar, StyleError::UnsupportedShape { style: Style::DeepObject, shape: Shape::Scalar })]
    fn deep_object_errors(#[case] raw: &[(&str, &str)], #[case] shape: Shape, #[case] expected: StyleError) {
        let err = decode_pairs(&pairs(raw), "filter", query(Style::DeepObject, true), shape).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn style_must_match_location() {
        let err = decode_pairs(&[], "id", Serialization::new(Location::Cookie, Style::DeepObject, true), Shape::Object)
            .unwrap_err();
        assert_eq!(err, StyleError::UnsupportedStyle { location: Location::Cookie, style: Style::DeepObject });

        let err = decode_str("5", "id", Serialization::new(Location::Header, Style::Label, false), Shape::Scalar)
            .unwrap_err();
        assert_eq!(err, StyleError::UnsupportedStyle { location: Location::Header, style: Style::Label });
    }

    #[rstest]
    #[case("5", path(Style::Simple, false), Shape::Scalar, scalar("5"))]
    #[case("3,4,5", path(Style::Simple, false), Shape::Array, array(&["3", "4", "5"]))]
    #[case("R,100,G,200", path(Style::Simple, false), Shape::Object, object(&[("R", "100"), ("G", "200")]))]
    #[case("R=100,G=200", path(Style::Simple, true), Shape::Object, object(&[("R", "100"), ("G", "200")]))]
    #[case(".5", path(Style::Label, false), Shape::Scalar, scalar("5"))]
    #[case(".3,4,5", path(Style::Label, false), Shape::Array, array(&["3", "4", "5"]))]
    #[case(".3.4.5", path(Style::Label, true), Shape::Array, array(&["3", "4", "5"]))]
    #[case(".R=100.G=200", path(Style::Label, true), Shape::Object, object(&[("R", "100"), ("G", "200")]))]
    #[case(";id=5", path(Style::Matrix, false), Shape::Scalar, scalar("5"))]
    #[case(";id=3,4,5", path(Style::Matrix, false), Shape::Array, array(&["3", "4", "5"]))]
    #[case(";id=3;id=4;id=5", path(Style::Matrix, true), Shape::Array, array(&["3", "4", "5"]))]
    #[case(";id=R,100,G,200", path(Style::Matrix, false), Shape::Object, object(&[("R", "100"), ("G", "200")]))]
    #[case(";R=100;G=200", path(Style::Matrix, true), Shape::Object, object(&[("R", "100"), ("G", "200")]))]
    #[case("caf%C3%A9,a%2Cb", path(Style::Simple, false), Shape::Array, array(&["café", "a,b"]))]
    fn path_styles(
        #[case] raw: &str,
        #[case] serialization: Serialization,
        #[case] shape: Shape,
        #[case] expected: ParamValue,
    ) {
        assert_eq!(decode_str(raw, "id", serialization, shape).unwrap(), expected);
    }

    #[rstest]
    #[case("5", path(Style::Label, false), Shape::Scalar)]
    #[case("id=5", path(Style::Matrix, false), Shape::Scalar)]
    #[case(";idx=5", path(Style::Matrix, false), Shape::Scalar)]
    #[case(";id=3;other=4", path(Style::Matrix, true), Shape::Array)]
    #[case(";R=100;G", path(Style::Matrix, true), Shape::Object)]
    #[case("R,100,G", path(Style::Simple, false), Shape::Object)]
    #[case("%FF", path(Style::Simple, false), Shape::Scalar)]
    fn malformed_path_values(#[case] raw: &str, #[case] serialization: Serialization, #[case] shape: Shape) {
        assert!(decode_str(raw, "id", serialization, shape).is_err());
    }

    #[test]
    fn header_elements_are_trimmed() {
        let serialization = Serialization::for_location(Location::Header);
        let decoded = decode_str("gzip, br ,deflate", "Accept-Encoding", serialization, Shape::Array).unwrap();
        assert_eq!(decoded, array(&["gzip", "br", "deflate"]));
    }

    fn header(explode: bool) -> Serialization {
        Serialization::new(Location::Header, Style::Simple, explode)
    }

    fn cookie(explode: bool) -> Serialization {
        Serialization::new(Location::Cookie, Style::Form, explode)
    }

    /// Encodes `value`, decodes it back and encodes the decoded value once more.
    fn assert_round_trip(name: &str, value: &ParamValue, serialization: Serialization) {
        match serialization.location {
            Location::Query | Location::Cookie => {
                let raw = encode_pairs(name, value, serialization).unwrap();
                match decode_pairs(&raw, name, serialization, value.shape()).unwrap() {
                    Some(decoded) => {
                        assert_eq!(&decoded, value, "{raw:?}");
                        assert_eq!(encode_pairs(name, &decoded, serialization).unwrap(), raw);
                    }
                    // nothing on the wire reads as absent
                    None => assert!(value.is_empty() && raw.is_empty(), "{value:?} lost in {raw:?}"),
                }
            }
            Location::Path | Location::Header => {
                let raw = encode_str(name, value, serialization).unwrap();
                let decoded = decode_str(&raw, name, serialization, value.shape()).unwrap();
                assert_eq!(&decoded, value, "{raw:?}");
                assert_eq!(encode_str(name, &decoded, serialization).unwrap(), raw);
            }
        }
    }

    #[rstest]
    fn every_serialization_round_trips(
        #[values(
            query(Style::Form, true),
            query(Style::Form, false),
            query(Style::SpaceDelimited, true),
            query(Style::SpaceDelimited, false),
            query(Style::PipeDelimited, true),
            query(Style::PipeDelimited, false),
            query(Style::DeepObject, true),
            path(Style::Simple, true),
            path(Style::Simple, false),
            path(Style::Label, true),
            path(Style::Label, false),
            path(Style::Matrix, true),
            path(Style::Matrix, false),
            header(true),
            header(false),
            cookie(true),
            cookie(false)
        )]
        serialization: Serialization,
        #[values(
            scalar("5"),
            scalar(""),
            array(&["3", "4", "5"]),
            array(&["blue"]),
            array(&[]),
            object(&[("R", "100"), ("G", "200")]),
            object(&[])
        )]
        value: ParamValue,
    ) {
        if serialization.style == Style::DeepObject && value.shape() != Shape::Object {
            let err = encode_pairs("id", &value, serialization).unwrap_err();
            assert_eq!(err, StyleError::UnsupportedShape { style: Style::DeepObject, shape: value.shape() });
            return;
        }
        assert_round_trip("id", &value, serialization);
    }

    #[test]
    fn matrix_exploded_empty_values() {
        let serialization = path(Style::Matrix, true);
        assert_eq!(encode_str("id", &array(&[]), serialization).unwrap(), "");
        assert_eq!(decode_str("", "id", serialization, Shape::Array).unwrap(), array(&[]));
        assert_eq!(decode_str("", "id", serialization, Shape::Object).unwrap(), object(&[]));
        // a scalar still needs its name
        assert!(decode_str("", "id", serialization, Shape::Scalar).is_err());
    }

    #[test]
    fn escaped_path_elements_round_trip() {
        let values = array(&["a,b", "café", "x.y;z"]);
        for serialization in [path(Style::Simple, false), path(Style::Label, true), path(Style::Matrix, true)] {
            assert_round_trip("id", &values, serialization);
        }
    }

    #[test]
    fn encodes_query_pairs() {
        let ids = array(&["1", "2"]);
        assert_eq!(
            encode_pairs("ids", &ids, query(Style::Form, true)).unwrap(),
            pairs(&[("ids", "1"), ("ids", "2")])
        );
        assert_eq!(encode_pairs("ids", &ids, query(Style::PipeDelimited, false)).unwrap(), pairs(&[("ids", "1|2")]));

        let filter = object(&[("type", "cat"), ("age", "3")]);
        let encoded = encode_pairs("filter", &filter, query(Style::DeepObject, true)).unwrap();
        assert_eq!(encoded, pairs(&[("filter[type]", "cat"), ("filter[age]", "3")]));
        assert_eq!(decode_pairs(&encoded, "filter", query(Style::DeepObject, true), Shape::Object).unwrap(), Some(filter));
    }

    #[test]
    fn encodes_path_values() {
        let ids = array(&["3", "4.5"]);
        assert_eq!(encode_str("id", &ids, path(Style::Label, true)).unwrap(), ".3.4%2E5");
        assert_eq!(encode_str("id", &ids, path(Style::Matrix, true)).unwrap(), ";id=3;id=4%2E5");

        let color = object(&[("R", "100"), ("G", "200")]);
        let encoded = encode_str("color", &color, path(Style::Matrix, false)).unwrap();
        assert_eq!(encoded, ";color=R,100,G,200");
        assert_eq!(decode_str(&encoded, "color", path(Style::Matrix, false), Shape::Object).unwrap(), color);

        let encoded = encode_str("id", &ids, path(Style::Label, true)).unwrap();
        assert_eq!(decode_str(&encoded, "id", path(Style::Label, true), Shape::Array).unwrap(), ids);
    }
}
