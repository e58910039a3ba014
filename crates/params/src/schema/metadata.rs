use crate::error::{MetadataError, Violation, Violations};
use crate::schema::annotation::{BODY, BodyAnnotation, PARAMETER, ParameterAnnotation};
use crate::schema::reflect::{FieldInfo, RecordType, ValueType};
use crate::schema::registry::{Annotation, TagRegistry};
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A validated field with its parsed annotations.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    index: usize,
    promoted: bool,
    value_type: ValueType,
    annotations: Vec<(&'static str, Annotation)>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position in the record that declared the field.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the field was promoted from an embedded record.
    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The annotation of `namespace`, if present and of type `A`.
    pub fn annotation<A: Any>(&self, namespace: &str) -> Option<&A> {
        self.annotations.iter().find(|(ns, _)| *ns == namespace).and_then(|(_, annotation)| annotation.downcast_ref())
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.annotations.iter().map(|(ns, _)| *ns)
    }

    pub fn parameter(&self) -> Option<&ParameterAnnotation> {
        self.annotation(PARAMETER)
    }

    pub fn body(&self) -> Option<&BodyAnnotation> {
        self.annotation(BODY)
    }

    /// The name used for this field inside a nested record: its parameter name when it has one.
    pub fn wire_name(&self) -> &str {
        self.parameter().map_or(self.name, |parameter| parameter.name.as_str())
    }

    /// The key this field is stored under inside a nested record.
    pub fn dest(&self) -> &str {
        self.parameter().map_or(self.name, |parameter| parameter.dest.as_str())
    }
}

/// Immutable description of a record, built once per type and shared.
#[derive(Debug)]
pub struct StructDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl StructDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order, embedded groups already flattened.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&at| &self.fields[at])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn body_field(&self) -> Option<(&FieldDescriptor, &BodyAnnotation)> {
        self.fields.iter().find_map(|field| field.body().map(|body| (field, body)))
    }
}

/// Checks the raw description of a field, reporting every violation at once.
///
/// Returns the checked index and value type.
pub fn validate_field(record: &'static str, field: &FieldInfo) -> Result<(usize, ValueType), MetadataError> {
    let mut violations = Vec::new();
    if field.name.is_empty() {
        violations.push(Violation::EmptyName);
    }
    if field.value_type.is_none() {
        violations.push(Violation::MissingType);
    }
    let index = usize::try_from(field.index);
    if index.is_err() {
        violations.push(Violation::NegativeIndex { index: field.index });
    }

    match (index, field.value_type) {
        (Ok(index), Some(value_type)) if violations.is_empty() => Ok((index, value_type)),
        _ => Err(MetadataError::InvalidField { record, field: field.name, violations: Violations::new(violations) }),
    }
}

/// Builds the descriptor of `record` using the namespaces of `registry`.
pub(crate) fn build(registry: &TagRegistry, record: RecordType) -> Result<StructDescriptor, MetadataError> {
    let mut collected = Vec::new();
    let mut lineage = vec![record.type_id()];
    collect(registry, record, 0, &mut lineage, &mut collected)?;

    // nearest enclosing declaration wins, ambiguous only when the nearest depth is shared
    let mut nearest: HashMap<&'static str, (usize, usize)> = HashMap::with_capacity(collected.len());
    for (depth, field) in &collected {
        nearest
            .entry(field.name)
            .and_modify(|(min, count)| match (*depth).cmp(min) {
                Ordering::Less => {
                    *min = *depth;
                    *count = 1;
                }
                Ordering::Equal => *count += 1,
                Ordering::Greater => {}
            })
            .or_insert((*depth, 1));
    }
    let ambiguous = |name: &str| nearest.get(name).is_some_and(|(_, count)| *count > 1);
    if let Some((_, field)) = collected.iter().find(|(_, field)| ambiguous(field.name)) {
        return Err(MetadataError::DuplicateField { record: record.name(), field: field.name });
    }

    let fields: Vec<FieldDescriptor> = collected
        .into_iter()
        .filter(|(depth, field)| nearest.get(field.name).is_some_and(|(min, _)| min == depth))
        .map(|(_, field)| field)
        .collect();

    let mut bodies = fields.iter().filter(|field| field.body().is_some());
    if let (Some(first), Some(second)) = (bodies.next(), bodies.next()) {
        return Err(MetadataError::MultipleBodies { record: record.name(), first: first.name, second: second.name });
    }

    let mut dests: HashMap<&str, &'static str> = HashMap::with_capacity(fields.len());
    for field in &fields {
        let dest = match (field.parameter(), field.body()) {
            (Some(parameter), _) => parameter.dest.as_str(),
            (None, Some(body)) => body.dest.as_str(),
            (None, None) => continue,
        };
        if let Some(first) = dests.insert(dest, field.name) {
            return Err(MetadataError::DuplicateDest {
                record: record.name(),
                dest: dest.to_owned(),
                first,
                second: field.name,
            });
        }
    }

    let by_name = fields.iter().enumerate().map(|(at, field)| (field.name, at)).collect();
    Ok(StructDescriptor { type_id: record.type_id(), type_name: record.name(), fields, by_name })
}

fn collect(
    registry: &TagRegistry,
    record: RecordType,
    depth: usize,
    lineage: &mut Vec<TypeId>,
    out: &mut Vec<(usize, FieldDescriptor)>,
) -> Result<(), MetadataError> {
    for (position, info) in record.fields().into_iter().enumerate() {
        let (index, value_type) = validate_field(record.name(), &info)?;

        if info.embedded {
            let ValueType::Record(nested) = value_type else {
                return Err(MetadataError::EmbeddedNotRecord { record: record.name(), field: info.name });
            };
            if lineage.contains(&nested.type_id()) {
                return Err(MetadataError::RecursiveEmbedding { record: record.name(), field: info.name });
            }
            lineage.push(nested.type_id());
            collect(registry, nested, depth + 1, lineage, out)?;
            lineage.pop();
            continue;
        }

        let mut annotations = Vec::new();
        for (namespace, parser) in registry.iter() {
            let parsed = match info.tag_for(namespace) {
                Some(raw) => parser.parse(&info, position, raw).map_err(|source| MetadataError::Annotation {
                    record: record.name(),
                    field: info.name,
                    namespace,
                    source,
                })?,
                None => parser.default_for(&info, position),
            };
            if let Some(annotation) = parsed {
                annotations.push((namespace, annotation));
            }
        }

        out.push((depth, FieldDescriptor { name: info.name, index, promoted: depth > 0, value_type, annotations }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::annotation::{BodyKind, Location};
    use crate::schema::reflect::{Reflect, ScalarKind};
    use crate::schema::registry::TagParser;
    use std::sync::Arc;

    struct Paging;

    impl Reflect for Paging {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::new("limit", 0, ValueType::Scalar(ScalarKind::Integer)),
                FieldInfo::new("offset", 1, ValueType::Scalar(ScalarKind::Integer)),
            ]
        }
    }

    struct ListPets;

    impl Reflect for ListPets {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::new("owner", 0, ValueType::Scalar(ScalarKind::String)).tag(PARAMETER, "owner,location=path"),
                FieldInfo::embed::<Paging>("paging", 1),
                // shadows the promoted Paging::limit
                FieldInfo::new("limit", 2, ValueType::Scalar(ScalarKind::String)).tag(PARAMETER, "max"),
                FieldInfo::new("secret", 3, ValueType::Scalar(ScalarKind::String)).tag(PARAMETER, "-"),
                FieldInfo::new("payload", 4, ValueType::Any).tag(BODY, "structured,required"),
            ]
        }
    }

    struct Looping;

    impl Reflect for Looping {
        fn fields() -> Vec<FieldInfo> {
            vec![FieldInfo::embed::<Looping>("again", 0)]
        }
    }

    struct Left;

    impl Reflect for Left {
        fn fields() -> Vec<FieldInfo> {
            vec![FieldInfo::new("id", 0, ValueType::Scalar(ScalarKind::Integer))]
        }
    }

    struct Right;

    impl Reflect for Right {
        fn fields() -> Vec<FieldInfo> {
            vec![FieldInfo::new("id", 0, ValueType::Scalar(ScalarKind::String))]
        }
    }

    struct Ambiguous;

    impl Reflect for Ambiguous {
        fn fields() -> Vec<FieldInfo> {
            vec![FieldInfo::embed::<Left>("left", 0), FieldInfo::embed::<Right>("right", 1)]
        }
    }

    struct Outer;

    impl Reflect for Outer {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::embed::<Left>("left", 0),
                FieldInfo::embed::<Right>("right", 1),
                FieldInfo::new("id", 2, ValueType::Scalar(ScalarKind::Integer)).tag(PARAMETER, "id,location=path"),
            ]
        }
    }

    struct SharedDest;

    impl Reflect for SharedDest {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::new("limit", 0, ValueType::Scalar(ScalarKind::Integer)),
                FieldInfo::new("max", 1, ValueType::Scalar(ScalarKind::Integer)).tag(PARAMETER, "max,dest=limit"),
            ]
        }
    }

    struct TwoBodies;

    impl Reflect for TwoBodies {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::new("a", 0, ValueType::Any).tag(BODY, ""),
                FieldInfo::new("b", 1, ValueType::Bytes).tag(BODY, "file"),
            ]
        }
    }

    fn build_of<T: Reflect>() -> Result<StructDescriptor, MetadataError> {
        build(&TagRegistry::default(), RecordType::of::<T>())
    }

    #[test]
    fn validate_accepts_well_formed_field() {
        let field = FieldInfo::new("limit", 2, ValueType::Scalar(ScalarKind::Integer));
        let (index, value_type) = validate_field("Paging", &field).unwrap();
        assert_eq!(index, 2);
        assert_eq!(value_type, ValueType::Scalar(ScalarKind::Integer));
    }

    #[test]
    fn validate_reports_every_violation() {
        let field = FieldInfo { name: "", index: -1, embedded: false, value_type: None, tags: Vec::new() };
        let err = validate_field("Broken", &field).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("field name cannot be empty"), "{message}");
        assert!(message.contains("value type cannot be missing"), "{message}");
        assert!(message.contains("index must be non-negative"), "{message}");
        match err {
            MetadataError::InvalidField { violations, .. } => assert_eq!(violations.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_reports_single_violation() {
        let field = FieldInfo { name: "limit", index: -4, embedded: false, value_type: None, tags: Vec::new() };
        let err = validate_field("Broken", &field).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("value type cannot be missing"));
        assert!(message.contains("index must be non-negative"));
        assert!(!message.contains("field name cannot be empty"));
    }

    #[test]
    fn builds_flattened_descriptor() {
        let descriptor = build_of::<ListPets>().unwrap();
        let names: Vec<_> = descriptor.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(names, vec!["owner", "offset", "limit", "secret", "payload"]);

        let owner = descriptor.field("owner").unwrap().parameter().unwrap();
        assert_eq!(owner.location, Location::Path);
        assert!(owner.required);

        let offset = descriptor.field("offset").unwrap();
        assert!(offset.is_promoted());
        assert_eq!(offset.parameter(), Some(&ParameterAnnotation::query("offset")));

        let limit = descriptor.field("limit").unwrap();
        assert!(!limit.is_promoted());
        assert_eq!(limit.value_type(), ValueType::Scalar(ScalarKind::String));
        assert_eq!(limit.wire_name(), "max");

        let secret = descriptor.field("secret").unwrap();
        assert!(secret.parameter().is_none());

        let (body_field, body) = descriptor.body_field().unwrap();
        assert_eq!(body_field.name(), "payload");
        assert_eq!(body.kind, BodyKind::Structured);
        assert!(body.required);
        assert!(body_field.parameter().is_none());
    }

    #[test]
    fn recursive_embedding_is_rejected() {
        let err = build_of::<Looping>().unwrap_err();
        assert!(matches!(err, MetadataError::RecursiveEmbedding { field: "again", .. }));
    }

    #[test]
    fn equal_depth_collision_is_rejected() {
        let err = build_of::<Ambiguous>().unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateField { field: "id", .. }));
    }

    #[test]
    fn outer_field_shadows_equal_depth_collision() {
        let descriptor = build_of::<Outer>().unwrap();
        let names: Vec<_> = descriptor.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(names, vec!["id"]);

        let id = descriptor.field("id").unwrap();
        assert!(!id.is_promoted());
        assert_eq!(id.index(), 2);
        assert_eq!(id.parameter().unwrap().location, Location::Path);
    }

    #[test]
    fn shared_destination_is_rejected() {
        let err = build_of::<SharedDest>().unwrap_err();
        match &err {
            MetadataError::DuplicateDest { dest, first, second, .. } => {
                assert_eq!(dest, "limit");
                assert_eq!(*first, "limit");
                assert_eq!(*second, "max");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("both decode into 'limit'"));
    }

    #[test]
    fn more_than_one_body_is_rejected() {
        let err = build_of::<TwoBodies>().unwrap_err();
        assert!(matches!(err, MetadataError::MultipleBodies { first: "a", second: "b", .. }));
    }

    #[test]
    fn annotation_errors_name_the_field() {
        struct BadStyle;
        impl Reflect for BadStyle {
            fn fields() -> Vec<FieldInfo> {
                vec![FieldInfo::new("id", 0, ValueType::Scalar(ScalarKind::Integer)).tag(PARAMETER, "id,location=header,style=form")]
            }
        }

        let err = build_of::<BadStyle>().unwrap_err();
        match &err {
            MetadataError::Annotation { field, namespace, .. } => {
                assert_eq!(*field, "id");
                assert_eq!(*namespace, PARAMETER);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("not allowed in header"));
    }

    #[test]
    fn custom_namespaces_are_visited() {
        struct Documented;
        impl Reflect for Documented {
            fn fields() -> Vec<FieldInfo> {
                vec![
                    FieldInfo::new("id", 0, ValueType::Scalar(ScalarKind::Integer)).tag("doc", "the identifier"),
                    FieldInfo::new("name", 1, ValueType::Scalar(ScalarKind::String)),
                ]
            }
        }

        let registry = TagRegistry::builder()
            .register(
                "doc",
                TagParser::new(|_, _, raw| Ok(Some(Arc::new(raw.to_owned()) as Annotation)))
                    .with_default(|field, _| Some(Arc::new(format!("undocumented {}", field.name)) as Annotation)),
            )
            .build();
        let descriptor = build(&registry, RecordType::of::<Documented>()).unwrap();

        let id = descriptor.field("id").unwrap();
        assert_eq!(id.annotation::<String>("doc").map(String::as_str), Some("the identifier"));
        assert_eq!(id.namespaces().collect::<Vec<_>>(), vec![PARAMETER, "doc"]);

        let name = descriptor.field("name").unwrap();
        assert_eq!(name.annotation::<String>("doc").map(String::as_str), Some("undocumented name"));
        // wrong type downcasts to nothing
        assert!(name.annotation::<u32>("doc").is_none());
    }
}
