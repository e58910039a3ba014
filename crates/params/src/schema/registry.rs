//! Pluggable annotation namespaces.
//!
//! Every namespace owns a [`TagParser`]: a parse function for fields that carry the
//! namespace's tag and an optional default function for fields that do not. The registry is
//! assembled once with [`TagRegistryBuilder`] and never mutated afterwards, so it can be read
//! from any thread without locking.

use crate::error::BoxError;
use crate::schema::annotation::{self, BODY, PARAMETER};
use crate::schema::reflect::FieldInfo;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A parsed annotation value, downcast by the consumer of the namespace.
pub type Annotation = Arc<dyn Any + Send + Sync>;

type ParseFn = dyn Fn(&FieldInfo, usize, &str) -> Result<Option<Annotation>, BoxError> + Send + Sync;
type DefaultFn = dyn Fn(&FieldInfo, usize) -> Option<Annotation> + Send + Sync;

/// Parser of one annotation namespace.
pub struct TagParser {
    parse: Box<ParseFn>,
    default: Option<Box<DefaultFn>>,
}

impl TagParser {
    /// `parse` receives the field, its position in the record and the raw tag text. Returning
    /// `Ok(None)` excludes the field from the namespace.
    pub fn new<P>(parse: P) -> Self
    where
        P: Fn(&FieldInfo, usize, &str) -> Result<Option<Annotation>, BoxError> + Send + Sync + 'static,
    {
        Self { parse: Box::new(parse), default: None }
    }

    /// Adds a function that produces an annotation for fields without this namespace's tag.
    #[must_use]
    pub fn with_default<D>(mut self, default: D) -> Self
    where
        D: Fn(&FieldInfo, usize) -> Option<Annotation> + Send + Sync + 'static,
    {
        self.default = Some(Box::new(default));
        self
    }

    pub fn parse(&self, field: &FieldInfo, position: usize, raw: &str) -> Result<Option<Annotation>, BoxError> {
        (self.parse)(field, position, raw)
    }

    pub fn default_for(&self, field: &FieldInfo, position: usize) -> Option<Annotation> {
        self.default.as_ref().and_then(|default| default(field, position))
    }
}

impl fmt::Debug for TagParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagParser").field("has_default", &self.default.is_some()).finish_non_exhaustive()
    }
}

/// Namespaces in registration order.
#[derive(Debug)]
pub struct TagRegistry {
    parsers: Vec<(&'static str, TagParser)>,
}

impl TagRegistry {
    /// A builder pre-populated with the `parameter` and `body` namespaces.
    pub fn builder() -> TagRegistryBuilder {
        TagRegistryBuilder::empty().register(PARAMETER, annotation::parameter_parser()).register(BODY, annotation::body_parser())
    }

    pub fn get(&self, namespace: &str) -> Option<&TagParser> {
        self.parsers.iter().find(|(ns, _)| *ns == namespace).map(|(_, parser)| parser)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.iter().map(|(ns, _)| *ns)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TagParser)> {
        self.parsers.iter().map(|(ns, parser)| (*ns, parser))
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct TagRegistryBuilder {
    parsers: Vec<(&'static str, TagParser)>,
}

impl TagRegistryBuilder {
    /// A builder without any namespace, not even the built-in ones.
    pub fn empty() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Registers `parser` for `namespace`. A namespace registered twice keeps its original
    /// position and the later parser.
    #[must_use]
    pub fn register(mut self, namespace: &'static str, parser: TagParser) -> Self {
        if let Some((_, slot)) = self.parsers.iter_mut().find(|(ns, _)| *ns == namespace) {
            debug!(namespace, "replace registered tag parser");
            *slot = parser;
        } else {
            self.parsers.push((namespace, parser));
        }
        self
    }

    pub fn build(self) -> TagRegistry {
        TagRegistry { parsers: self.parsers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::reflect::{ScalarKind, ValueType};

    fn field() -> FieldInfo {
        FieldInfo::new("limit", 0, ValueType::Scalar(ScalarKind::Integer))
    }

    #[test]
    fn builtin_namespaces() {
        let registry = TagRegistry::default();
        assert_eq!(registry.namespaces().collect::<Vec<_>>(), vec![PARAMETER, BODY]);
        assert!(registry.get(PARAMETER).is_some());
        assert!(registry.get("doc").is_none());
    }

    #[test]
    fn later_registration_wins_and_keeps_position() {
        let registry = TagRegistry::builder()
            .register("doc", TagParser::new(|_, _, raw| Ok(Some(Arc::new(raw.to_owned()) as Annotation))))
            .register(PARAMETER, TagParser::new(|_, _, _| Ok(Some(Arc::new(42_u32) as Annotation))))
            .build();

        assert_eq!(registry.namespaces().collect::<Vec<_>>(), vec![PARAMETER, BODY, "doc"]);

        let parameter = registry.get(PARAMETER).unwrap();
        let parsed = parameter.parse(&field(), 0, "limit").unwrap().unwrap();
        assert_eq!(parsed.downcast_ref::<u32>(), Some(&42));
        // the replacement carries no default
        assert!(parameter.default_for(&field(), 0).is_none());
    }

    #[test]
    fn default_function_is_optional() {
        let parser = TagParser::new(|_, _, _| Ok(None)).with_default(|field, position| {
            Some(Arc::new(format!("{}#{position}", field.name)) as Annotation)
        });

        let value = parser.default_for(&field(), 3).unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("limit#3"));
        assert!(parser.parse(&field(), 3, "-").unwrap().is_none());
    }

    #[test]
    fn parse_errors_are_boxed() {
        let parser = TagParser::new(|_, _, raw| Err(format!("bad tag: {raw}").into()));
        let err = parser.parse(&field(), 0, "???").unwrap_err();
        assert_eq!(err.to_string(), "bad tag: ???");
    }
}
