//! Field registry: maps type names and field names to handlers.
//!
//! Populated through a [`RegistryBuilder`] during startup and then frozen
//! into a [`FieldRegistry`], which is shared by reference.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use mlwr_types::ObjectKind;

use crate::ast::TermValue;
use crate::error::{SearchError, SearchResult};
use crate::fields::Field;
use crate::predicate::{ListAttr, NumberAttr, Predicate, Relation, TextAttr, TimeAttr};
use crate::selector::{PathSelector, Segment};

/// A queryable object type: the abstract base or one concrete kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Object,
    Typed(ObjectKind),
}

impl ObjectType {
    /// The concrete kind, `None` for the abstract base.
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Object => None,
            Self::Typed(kind) => Some(*kind),
        }
    }
}

impl From<ObjectKind> for ObjectType {
    fn from(kind: ObjectKind) -> Self {
        Self::Typed(kind)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("Object"),
            Self::Typed(kind) => f.write_str(kind.type_name()),
        }
    }
}

/// A field reference resolved against the registry.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedField<'a> {
    pub field: Field,
    /// Type the field belongs to after any type-name prefix.
    pub selected: ObjectType,
    /// Remaining path, starting with the field segment.
    pub path: &'a [Segment],
}

type FieldTable = BTreeMap<String, Field>;

/// Mutable registration phase of the registry.
#[derive(Clone, Debug)]
pub struct RegistryBuilder {
    object_mapping: HashMap<String, ObjectType>,
    field_mapping: HashMap<ObjectType, FieldTable>,
}

impl RegistryBuilder {
    /// A builder holding the `object` type and the base object fields.
    pub fn new() -> Self {
        let mut builder = Self {
            object_mapping: HashMap::new(),
            field_mapping: HashMap::new(),
        };
        builder
            .register_object_mapping("object", ObjectType::Object)
            .register_field_mapping(ObjectType::Object, base_fields());
        builder
    }

    /// Register the built-in file, config and blob types.
    pub fn with_builtin_types(mut self) -> Self {
        self.register_object_mapping("file", ObjectKind::File.into())
            .register_object_mapping("config", ObjectKind::Config.into())
            .register_object_mapping("static", ObjectKind::Config.into())
            .register_object_mapping("blob", ObjectKind::TextBlob.into())
            .register_field_mapping(ObjectKind::File.into(), file_fields())
            .register_field_mapping(ObjectKind::Config.into(), config_fields())
            .register_field_mapping(ObjectKind::TextBlob.into(), blob_fields());
        self
    }

    /// Map a type name used in queries to an object type.
    pub fn register_object_mapping(&mut self, name: impl Into<String>, ty: ObjectType) -> &mut Self {
        self.object_mapping.insert(name.into(), ty);
        self
    }

    /// Set the field table of `ty`, replacing any previous one.
    pub fn register_field_mapping<I, S>(&mut self, ty: ObjectType, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        let table = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.field_mapping.insert(ty, table);
        self
    }

    pub fn build(self) -> FieldRegistry {
        tracing::debug!(
            object_types = self.object_mapping.len(),
            field_tables = self.field_mapping.len(),
            "field registry frozen"
        );
        FieldRegistry {
            object_mapping: self.object_mapping,
            field_mapping: self.field_mapping,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable field registry.
#[derive(Clone, Debug)]
pub struct FieldRegistry {
    object_mapping: HashMap<String, ObjectType>,
    field_mapping: HashMap<ObjectType, FieldTable>,
}

impl FieldRegistry {
    /// Base fields plus the built-in object types.
    pub fn with_defaults() -> Self {
        RegistryBuilder::new().with_builtin_types().build()
    }

    /// Look up a type name (`file`, `config`, `static`, `blob`, `object`).
    pub fn object_type(&self, name: &str) -> Option<ObjectType> {
        self.object_mapping.get(name).copied()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.object_mapping.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fields registered directly on `ty`, sorted by name.
    pub fn fields(&self, ty: ObjectType) -> impl Iterator<Item = (&str, &Field)> {
        self.field_mapping
            .get(&ty)
            .into_iter()
            .flat_map(|table| table.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Parse `selector` and resolve it for a query over `queried`.
    pub fn get_field_mapper(
        &self,
        queried: ObjectType,
        selector: &str,
    ) -> SearchResult<(Field, ObjectType, PathSelector)> {
        let path = PathSelector::parse(selector)?;
        let resolved = self.resolve(queried, path.segments())?;
        let (field, selected) = (resolved.field, resolved.selected);
        let remaining = PathSelector::from_segments(resolved.path.to_vec());
        Ok((field, selected, remaining))
    }

    /// Resolve parsed segments for a query over `queried`.
    pub fn resolve<'a>(
        &self,
        queried: ObjectType,
        segments: &'a [Segment],
    ) -> SearchResult<ResolvedField<'a>> {
        let first = segments
            .first()
            .ok_or_else(|| SearchError::FieldNotQueryable(String::new()))?;
        let (selected, path) = match first.key().and_then(|name| self.object_type(name)) {
            Some(ty) if segments.len() > 1 && first.is_plain() => (ty, &segments[1..]),
            _ => (queried, segments),
        };

        let field_segment = &path[0];
        let name = field_segment.key().ok_or_else(|| {
            SearchError::FieldNotQueryable(format!("{field_segment}: field name must be literal"))
        })?;
        let field = self
            .lookup(selected, name)
            .or_else(|| self.lookup(ObjectType::Object, name))
            .ok_or_else(|| SearchError::FieldNotQueryable(format!("no such field {name}")))?;
        Ok(ResolvedField {
            field,
            selected,
            path,
        })
    }

    /// Resolve the segments and build the predicate for `value`, scoped to
    /// the selected type when a type prefix switched away from `queried`.
    pub fn condition(
        &self,
        queried: ObjectType,
        segments: &[Segment],
        value: &TermValue,
    ) -> SearchResult<Predicate> {
        let resolved = self.resolve(queried, segments)?;
        let predicate = resolved.field.get_condition(self, value, resolved.path)?;
        match resolved.selected.kind() {
            Some(kind) if resolved.selected != queried => Ok(predicate.scoped(kind)),
            _ => Ok(predicate),
        }
    }

    /// Predicate for the sub-path of a relation field (`parent.family`).
    ///
    /// A type prefix or a base field resolves as usual. Otherwise the field
    /// is looked up in every concrete type that has it, and the matches are
    /// OR-ed, each scoped to its kind.
    pub fn related_condition(
        &self,
        segments: &[Segment],
        value: &TermValue,
    ) -> SearchResult<Predicate> {
        let first = segments.first().filter(|s| s.is_plain());
        let Some(name) = first.and_then(Segment::key) else {
            return self.condition(ObjectType::Object, segments, value);
        };
        let prefixed = segments.len() > 1 && self.object_type(name).is_some();
        if prefixed || self.lookup(ObjectType::Object, name).is_some() {
            return self.condition(ObjectType::Object, segments, value);
        }

        let mut kinds: Vec<ObjectKind> = self
            .field_mapping
            .iter()
            .filter(|(_, table)| table.contains_key(name))
            .filter_map(|(ty, _)| ty.kind())
            .collect();
        kinds.sort();
        let mut alternatives = Vec::with_capacity(kinds.len());
        for kind in kinds {
            alternatives.push(self.condition(kind.into(), segments, value)?.scoped(kind));
        }
        match alternatives.len() {
            0 => self.condition(ObjectType::Object, segments, value),
            1 => Ok(alternatives.remove(0)),
            _ => Ok(Predicate::Or(alternatives)),
        }
    }

    fn lookup(&self, ty: ObjectType, name: &str) -> Option<Field> {
        self.field_mapping.get(&ty)?.get(name).copied()
    }
}

fn base_fields() -> Vec<(&'static str, Field)> {
    vec![
        ("dhash", Field::String(TextAttr::Dhash)),
        ("tag", Field::List(ListAttr::Tag)),
        ("comment", Field::List(ListAttr::Comment)),
        ("comment_author", Field::List(ListAttr::CommentAuthor)),
        ("meta", Field::Attribute),
        ("attribute", Field::Attribute),
        ("shared", Field::List(ListAttr::SharedGroup)),
        ("sharer", Field::List(ListAttr::Sharer)),
        ("uploader", Field::List(ListAttr::Uploader)),
        ("upload_time", Field::Datetime(TimeAttr::UploadTime)),
        ("upload_count", Field::UploadCount),
        ("parent", Field::Relation(Relation::Parent)),
        ("child", Field::Relation(Relation::Child)),
    ]
}

fn file_fields() -> Vec<(&'static str, Field)> {
    vec![
        ("name", Field::AltName),
        ("size", Field::Size(NumberAttr::FileSize)),
        ("type", Field::String(TextAttr::FileType)),
        ("md5", Field::String(TextAttr::Md5)),
        ("sha1", Field::String(TextAttr::Sha1)),
        ("sha256", Field::String(TextAttr::Sha256)),
        ("sha512", Field::String(TextAttr::Sha512)),
        ("ssdeep", Field::String(TextAttr::Ssdeep)),
        ("crc32", Field::String(TextAttr::Crc32)),
        ("multi", Field::Multi(ObjectKind::File)),
    ]
}

fn config_fields() -> Vec<(&'static str, Field)> {
    vec![
        ("type", Field::String(TextAttr::ConfigType)),
        ("family", Field::String(TextAttr::Family)),
        ("cfg", Field::Document),
        ("multi", Field::Multi(ObjectKind::Config)),
    ]
}

fn blob_fields() -> Vec<(&'static str, Field)> {
    vec![
        ("name", Field::String(TextAttr::BlobName)),
        ("size", Field::Size(NumberAttr::BlobSize)),
        ("type", Field::String(TextAttr::BlobType)),
        ("content", Field::String(TextAttr::Content)),
        ("first_seen", Field::Datetime(TimeAttr::UploadTime)),
        ("last_seen", Field::Datetime(TimeAttr::LastSeen)),
        ("multi", Field::Multi(ObjectKind::TextBlob)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ObjectType {
        ObjectKind::Config.into()
    }

    #[test]
    fn type_prefix_switches_selected_type() {
        let registry = FieldRegistry::with_defaults();
        let (field, selected, rest) = registry.get_field_mapper(config(), "file.size").unwrap();
        assert_eq!(field, Field::Size(NumberAttr::FileSize));
        assert_eq!(selected, ObjectKind::File.into());
        assert_eq!(rest.to_string(), "size");
    }

    #[test]
    fn falls_back_to_base_fields() {
        let registry = FieldRegistry::with_defaults();
        let (field, selected, _) = registry.get_field_mapper(config(), "tag").unwrap();
        assert_eq!(field, Field::List(ListAttr::Tag));
        assert_eq!(selected, config());

        let (field, _, rest) = registry.get_field_mapper(config(), "cfg.c2[*]").unwrap();
        assert_eq!(field, Field::Document);
        assert_eq!(rest.to_string(), "cfg.c2[*]");
    }

    #[test]
    fn same_name_differs_per_type() {
        let registry = FieldRegistry::with_defaults();
        let file = registry.get_field_mapper(ObjectKind::File.into(), "type").unwrap();
        let blob = registry.get_field_mapper(ObjectKind::TextBlob.into(), "type").unwrap();
        assert_eq!(file.0, Field::String(TextAttr::FileType));
        assert_eq!(blob.0, Field::String(TextAttr::BlobType));
    }

    #[test]
    fn legacy_static_alias() {
        let registry = FieldRegistry::with_defaults();
        assert_eq!(registry.object_type("static"), Some(config()));
        let (field, selected, _) = registry
            .get_field_mapper(ObjectType::Object, "static.family")
            .unwrap();
        assert_eq!(field, Field::String(TextAttr::Family));
        assert_eq!(selected, config());
    }

    #[test]
    fn unknown_fields_are_not_queryable() {
        let registry = FieldRegistry::with_defaults();
        for selector in ["nope", "file.nope", "file", "*", "cfg..x"] {
            assert!(registry.get_field_mapper(config(), selector).is_err(), "{selector}");
        }
        // `size` is not a config field nor a base field.
        assert!(matches!(
            registry.get_field_mapper(config(), "size"),
            Err(SearchError::FieldNotQueryable(_))
        ));
        assert!(matches!(
            registry.get_field_mapper(config(), "cfg..x"),
            Err(SearchError::Selector(_))
        ));
    }

    #[test]
    fn base_only_registry() {
        let registry = RegistryBuilder::new().build();
        assert_eq!(registry.type_names(), vec!["object"]);
        assert!(registry.get_field_mapper(ObjectType::Object, "dhash").is_ok());
        assert!(registry.get_field_mapper(ObjectType::Object, "file.size").is_err());
    }

    #[test]
    fn field_mapping_last_writer_wins() {
        let mut builder = RegistryBuilder::new().with_builtin_types();
        builder.register_field_mapping(config(), [("family", Field::String(TextAttr::Family))]);
        let registry = builder.build();
        assert!(registry.get_field_mapper(config(), "family").is_ok());
        assert!(registry.get_field_mapper(config(), "cfg").is_err());
        assert_eq!(registry.fields(config()).count(), 1);
    }

    #[test]
    fn condition_scopes_cross_type_fields() {
        let registry = FieldRegistry::with_defaults();
        let path = PathSelector::parse("file.size").unwrap();
        let value = TermValue::Term { value: "10".into() };
        let p = registry.condition(config(), path.segments(), &value).unwrap();
        let Predicate::And(parts) = p else {
            panic!("expected scoped predicate");
        };
        assert_eq!(parts[0], Predicate::KindIs(ObjectKind::File));

        let path = PathSelector::parse("config.family").unwrap();
        let value = TermValue::Term { value: "x".into() };
        let p = registry.condition(config(), path.segments(), &value).unwrap();
        assert!(matches!(p, Predicate::Text { .. }));
    }

    #[test]
    fn relation_sub_path_without_type_prefix() {
        let registry = FieldRegistry::with_defaults();
        let value = TermValue::Term { value: "emotet".into() };
        let path = PathSelector::parse("parent.family").unwrap();
        let p = registry
            .condition(ObjectKind::TextBlob.into(), path.segments(), &value)
            .unwrap();
        let Predicate::Related { relation, inner } = p else {
            panic!("expected relation predicate");
        };
        assert_eq!(relation, Relation::Parent);
        let Predicate::And(parts) = *inner else {
            panic!("expected scoped predicate");
        };
        assert_eq!(parts[0], Predicate::KindIs(ObjectKind::Config));

        // `type` exists on every concrete kind.
        let path = PathSelector::parse("child.type").unwrap();
        let p = registry.condition(config(), path.segments(), &value).unwrap();
        let Predicate::Related { inner, .. } = p else {
            panic!("expected relation predicate");
        };
        let Predicate::Or(alternatives) = *inner else {
            panic!("expected alternatives");
        };
        assert_eq!(alternatives.len(), 3);

        // Base fields stay unscoped.
        let path = PathSelector::parse("parent.tag").unwrap();
        let p = registry.condition(config(), path.segments(), &value).unwrap();
        let Predicate::Related { inner, .. } = p else {
            panic!("expected relation predicate");
        };
        assert!(matches!(*inner, Predicate::AnyOf { .. }));

        let path = PathSelector::parse("parent.nope").unwrap();
        assert!(matches!(
            registry.condition(config(), path.segments(), &value),
            Err(SearchError::FieldNotQueryable(_))
        ));
    }
}
