//! Predicate evaluation against repository objects.

use mlwr_store::{ObjectBody, ObjectRepository, StoredObject};
use serde_json::Value;

use crate::ast::QueryNode;
use crate::error::SearchResult;
use crate::predicate::{
    DocCondition, DocSource, ListAttr, NumberAttr, Predicate, Relation, TextAttr, TextMatch,
    TimeAttr, ValueMatch,
};
use crate::query::QueryTranslator;
use crate::registry::{FieldRegistry, ObjectType};
use crate::selector::Step;

/// Run a query over every object of `queried` type in the repository.
pub fn search<R>(
    repo: &R,
    registry: &FieldRegistry,
    queried: ObjectType,
    node: &QueryNode,
) -> SearchResult<Vec<StoredObject>>
where
    R: ObjectRepository + ?Sized,
{
    let predicate = QueryTranslator::new(registry).translate(queried, node)?;
    let evaluator = Evaluator::new(repo);
    let mut hits = Vec::new();
    for object in repo.list(queried.kind())? {
        if evaluator.matches(&predicate, &object)? {
            hits.push(object);
        }
    }
    tracing::debug!(queried = %queried, hits = hits.len(), "search finished");
    Ok(hits)
}

/// Evaluates predicates, following relations through the repository.
pub struct Evaluator<'a, R: ?Sized> {
    repo: &'a R,
}

impl<'a, R: ObjectRepository + ?Sized> Evaluator<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    pub fn matches(&self, predicate: &Predicate, object: &StoredObject) -> SearchResult<bool> {
        Ok(match predicate {
            Predicate::Const(b) => *b,
            Predicate::And(parts) => {
                for part in parts {
                    if !self.matches(part, object)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Or(parts) => {
                for part in parts {
                    if self.matches(part, object)? {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::Not(inner) => !self.matches(inner, object)?,
            Predicate::KindIs(kind) => object.kind() == *kind,
            Predicate::Text { attr, matcher } => {
                text_attr(object, *attr).is_some_and(|text| matcher.matches(&text))
            }
            Predicate::Number { attr, bounds } => {
                number_attr(object, *attr).is_some_and(|n| bounds.contains(&n))
            }
            Predicate::Time { attr, bounds } => match attr {
                TimeAttr::UploadTime => bounds.contains(&object.meta.upload_time),
                TimeAttr::LastSeen => object
                    .as_text_blob()
                    .is_some_and(|blob| bounds.contains(&blob.last_seen)),
            },
            Predicate::AnyOf { list, matcher } => list_attr(object, *list)
                .iter()
                .any(|item| matcher.matches(item)),
            Predicate::Related { relation, inner } => self.related(object, *relation, inner)?,
            Predicate::Document { source, condition } => documents(object, source)
                .iter()
                .any(|doc| document_matches(doc, condition)),
        })
    }

    fn related(
        &self,
        object: &StoredObject,
        relation: Relation,
        inner: &Predicate,
    ) -> SearchResult<bool> {
        let ids = match relation {
            Relation::Parent => object.meta.parents.iter().copied().collect(),
            Relation::Child => self.repo.children(&object.dhash())?,
        };
        for id in ids {
            if let Some(other) = self.repo.get(&id)? {
                if self.matches(inner, &other)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn text_attr(object: &StoredObject, attr: TextAttr) -> Option<String> {
    let text = match (&object.body, attr) {
        (_, TextAttr::Dhash) => return Some(object.dhash().to_hex()),
        (ObjectBody::File(f), TextAttr::FileName) => &f.file_name,
        (ObjectBody::File(f), TextAttr::FileType) => &f.file_type,
        (ObjectBody::File(f), TextAttr::Md5) => &f.md5,
        (ObjectBody::File(f), TextAttr::Sha1) => &f.sha1,
        (ObjectBody::File(f), TextAttr::Sha256) => &f.sha256,
        (ObjectBody::File(f), TextAttr::Sha512) => &f.sha512,
        (ObjectBody::File(f), TextAttr::Crc32) => &f.crc32,
        (ObjectBody::File(f), TextAttr::Ssdeep) => f.ssdeep.as_ref()?,
        (ObjectBody::Config(c), TextAttr::ConfigType) => &c.config_type,
        (ObjectBody::Config(c), TextAttr::Family) => &c.family,
        (ObjectBody::TextBlob(b), TextAttr::BlobName) => &b.blob_name,
        (ObjectBody::TextBlob(b), TextAttr::BlobType) => &b.blob_type,
        (ObjectBody::TextBlob(b), TextAttr::Content) => &b.content,
        _ => return None,
    };
    Some(text.clone())
}

fn number_attr(object: &StoredObject, attr: NumberAttr) -> Option<u64> {
    match (&object.body, attr) {
        (_, NumberAttr::UploadCount) => Some(object.meta.upload_count),
        (ObjectBody::File(f), NumberAttr::FileSize) => Some(f.file_size),
        (ObjectBody::TextBlob(b), NumberAttr::BlobSize) => Some(b.blob_size),
        _ => None,
    }
}

fn list_attr(object: &StoredObject, list: ListAttr) -> Vec<&str> {
    let meta = &object.meta;
    match list {
        ListAttr::Tag => meta.tags.iter().map(String::as_str).collect(),
        ListAttr::Comment => meta.comments.iter().map(|c| c.comment.as_str()).collect(),
        ListAttr::CommentAuthor => meta.comments.iter().map(|c| c.author.as_str()).collect(),
        ListAttr::SharedGroup => meta.shares.iter().map(|s| s.group.as_str()).collect(),
        ListAttr::Sharer => meta.shares.iter().map(|s| s.sharer.as_str()).collect(),
        ListAttr::Uploader => meta.uploaders.iter().map(String::as_str).collect(),
        ListAttr::AltName => object
            .as_file()
            .map(|f| f.alt_names.iter().map(String::as_str).collect())
            .unwrap_or_default(),
    }
}

fn documents<'o>(object: &'o StoredObject, source: &DocSource) -> Vec<&'o Value> {
    match source {
        DocSource::Cfg => object.as_config().map(|c| vec![&c.cfg]).unwrap_or_default(),
        DocSource::Attribute(key) => object
            .meta
            .attributes
            .get(key)
            .map(|values| values.iter().collect())
            .unwrap_or_default(),
    }
}

fn document_matches(doc: &Value, condition: &DocCondition) -> bool {
    match condition {
        DocCondition::Text(pattern) => pattern.matches(&doc.to_string()),
        DocCondition::At { path, value } => select(doc, path)
            .into_iter()
            .any(|selected| value_matches(selected, value)),
    }
}

/// Values reached by `path`. Key steps applied to an array look into its
/// elements.
pub(crate) fn select<'v>(root: &'v Value, path: &[Step]) -> Vec<&'v Value> {
    let mut current = vec![root];
    for step in path {
        let mut next = Vec::new();
        for value in current {
            apply_step(value, step, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn apply_step<'v>(value: &'v Value, step: &Step, out: &mut Vec<&'v Value>) {
    match (step, value) {
        (Step::Key(key), Value::Object(map)) => out.extend(map.get(key)),
        (Step::Key(_), Value::Array(items)) => {
            for item in items.iter().filter(|item| item.is_object()) {
                apply_step(item, step, out);
            }
        }
        (Step::AnyKey, Value::Object(map)) => out.extend(map.values()),
        (Step::AnyElement, Value::Array(items)) => out.extend(items.iter()),
        (Step::Index(i), Value::Array(items)) => out.extend(items.get(*i)),
        (Step::Descend, _) => descend(value, out),
        _ => {}
    }
}

fn descend<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    out.push(value);
    match value {
        Value::Object(map) => map.values().for_each(|v| descend(v, out)),
        Value::Array(items) => items.iter().for_each(|v| descend(v, out)),
        _ => {}
    }
}

fn value_matches(value: &Value, condition: &ValueMatch) -> bool {
    if let Value::Array(items) = value {
        return items
            .iter()
            .any(|item| !item.is_array() && value_matches(item, condition));
    }
    match condition {
        ValueMatch::Equals { text, number } => scalar_equals(value, text, *number),
        ValueMatch::Range(bounds) => numeric(value).is_some_and(|n| bounds.contains(&n)),
    }
}

fn scalar_equals(value: &Value, text: &TextMatch, number: Option<f64>) -> bool {
    match value {
        Value::String(s) => text.matches(s),
        Value::Number(n) => {
            number.is_some_and(|q| n.as_f64() == Some(q)) || text.matches(&n.to_string())
        }
        Value::Bool(b) => text.matches(if *b { "true" } else { "false" }),
        Value::Null => text.matches("null"),
        _ => false,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlwr_store::{
        Annotation, InMemoryRepository, NewObject, UploadContext, WriteBatch,
    };
    use mlwr_types::{Dhash, ObjectKind};
    use serde_json::json;

    struct Fixture {
        repo: InMemoryRepository,
        registry: FieldRegistry,
        blob: Dhash,
        config: Dhash,
        file: Dhash,
    }

    fn fixture() -> Fixture {
        let repo = InMemoryRepository::new();
        let mut batch = WriteBatch::new(UploadContext::new("alice", vec!["public".into()]));
        let blob = batch.add_object(NewObject::text_blob("c2.txt", "raw_cfg", "c2 1.2.3.4:443"));
        let config = batch.add_object(NewObject::config(
            "emotet",
            "static",
            json!({
                "c2": {"in-blob": blob.to_hex()},
                "port": 443,
                "urls": [{"host": "a.com"}, {"host": "b.evil.com"}],
                "tags": ["x", "y"],
                "nested": {"deep": {"key": "C:\\Windows\\x.dll"}},
            }),
        ));
        batch.add_link(config, blob);
        let file = batch.add_object(NewObject::file("dropper.exe", b"MZ\x90\x00sample".to_vec()));
        repo.apply(batch).unwrap();

        let mut again = WriteBatch::new(UploadContext::new("bob", vec!["team".into()]));
        again.add_object(NewObject::file("invoice.pdf.exe", b"MZ\x90\x00sample".to_vec()));
        repo.apply(again).unwrap();

        repo.annotate(&file, Annotation::Tag("dropper".into())).unwrap();
        repo.annotate(
            &config,
            Annotation::Attribute {
                key: "origin".into(),
                value: json!({"country": "PL", "honeypot": "hp-01"}),
            },
        )
        .unwrap();

        Fixture {
            repo,
            registry: FieldRegistry::with_defaults(),
            blob,
            config,
            file,
        }
    }

    fn hits(fx: &Fixture, queried: ObjectType, node: QueryNode) -> Vec<Dhash> {
        search(&fx.repo, &fx.registry, queried, &node)
            .unwrap()
            .iter()
            .map(StoredObject::dhash)
            .collect()
    }

    fn config_type() -> ObjectType {
        ObjectKind::Config.into()
    }

    // -----------------------------------------------------------------------
    // Plain fields
    // -----------------------------------------------------------------------

    #[test]
    fn string_and_list_fields() {
        let fx = fixture();
        assert_eq!(hits(&fx, config_type(), QueryNode::term("family", "emo*")), vec![fx.config]);
        assert!(hits(&fx, config_type(), QueryNode::term("family", "emo")).is_empty());
        assert_eq!(hits(&fx, ObjectType::Object, QueryNode::term("tag", "dropper")), vec![fx.file]);
        assert_eq!(
            hits(&fx, ObjectKind::File.into(), QueryNode::term("uploader", "bob")),
            vec![fx.file]
        );
        assert_eq!(
            hits(&fx, ObjectKind::File.into(), QueryNode::term("shared", "team")),
            vec![fx.file]
        );
    }

    #[test]
    fn alt_names_are_searchable() {
        let fx = fixture();
        let file = ObjectKind::File.into();
        assert_eq!(hits(&fx, file, QueryNode::term("name", "dropper.exe")), vec![fx.file]);
        assert_eq!(hits(&fx, file, QueryNode::term("name", "invoice.pdf.exe")), vec![fx.file]);
        assert_eq!(hits(&fx, file, QueryNode::term("name", "invoice*")), vec![fx.file]);
        assert!(hits(&fx, file, QueryNode::term("name", "other.exe")).is_empty());
    }

    #[test]
    fn multi_resolves_by_hash_length() {
        let fx = fixture();
        let stored = fx.repo.get(&fx.file).unwrap().unwrap();
        let f = stored.as_file().unwrap();
        let file = ObjectKind::File.into();
        for hash in [&f.crc32, &f.md5, &f.sha1, &f.sha256, &f.sha512] {
            assert_eq!(hits(&fx, file, QueryNode::term("multi", hash.as_str())), vec![fx.file]);
        }
        // A crc32-length value never matches another hash column.
        assert!(hits(&fx, file, QueryNode::term("multi", &f.md5[..8])).is_empty());

        let blob = ObjectKind::TextBlob.into();
        assert_eq!(hits(&fx, blob, QueryNode::term("multi", &fx.blob.to_hex())), vec![fx.blob]);
        assert_eq!(hits(&fx, blob, QueryNode::term("multi", "1.2.3.4")), vec![fx.blob]);
        assert_eq!(hits(&fx, config_type(), QueryNode::term("multi", "evil.com")), vec![fx.config]);
    }

    #[test]
    fn sizes_and_counts() {
        let fx = fixture();
        let file = ObjectKind::File.into();
        assert_eq!(hits(&fx, file, QueryNode::term("size", "10")), vec![fx.file]);
        assert_eq!(hits(&fx, file, QueryNode::term("size", "<1kB")), vec![fx.file]);
        assert!(hits(&fx, file, QueryNode::term("size", ">=1kB")).is_empty());
        assert_eq!(hits(&fx, file, QueryNode::term("upload_count", "2")), vec![fx.file]);
        assert_eq!(
            hits(&fx, ObjectType::Object, QueryNode::range("upload_count", Some("1"), Some("1"), true, true)).len(),
            2
        );
    }

    #[test]
    fn upload_time_ranges() {
        let fx = fixture();
        let all = hits(&fx, ObjectType::Object, QueryNode::term("upload_time", ">=2000-01-01"));
        assert_eq!(all.len(), 3);
        assert!(hits(&fx, ObjectType::Object, QueryNode::term("upload_time", "<2000-01-01")).is_empty());
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    #[test]
    fn cfg_paths_and_wildcards() {
        let fx = fixture();
        let q = |field: &str, value: &str| hits(&fx, config_type(), QueryNode::term(field, value));
        assert_eq!(q("cfg.port", "443"), vec![fx.config]);
        assert_eq!(q("cfg.port", ">400"), vec![fx.config]);
        assert!(q("cfg.port", "<400").is_empty());
        assert_eq!(q("cfg.urls[*].host", "a.com"), vec![fx.config]);
        assert_eq!(q("cfg.urls.host", "*.evil.com"), vec![fx.config]);
        assert_eq!(q("cfg.urls[1].host", "b.evil.com"), vec![fx.config]);
        assert!(q("cfg.urls[0].host", "b.evil.com").is_empty());
        assert_eq!(q("cfg.tags", "y"), vec![fx.config]);
        assert_eq!(q("cfg.*.deep.key", r"C:\\Windows\\x.dll"), vec![fx.config]);
        assert_eq!(q("cfg.**.key", "*x.dll"), vec![fx.config]);
        assert!(q("cfg.missing", "*").is_empty());
    }

    #[test]
    fn compact_blob_reference_matches_verbatim() {
        let fx = fixture();
        let got = hits(
            &fx,
            config_type(),
            QueryNode::term("cfg.c2.in-blob", &fx.blob.to_hex()),
        );
        assert_eq!(got, vec![fx.config]);
    }

    #[test]
    fn cfg_text_search() {
        let fx = fixture();
        assert_eq!(hits(&fx, config_type(), QueryNode::term("cfg", "a.com")), vec![fx.config]);
        assert_eq!(
            hits(&fx, config_type(), QueryNode::phrase("cfg", "C:\\Windows\\x.dll")),
            vec![fx.config]
        );
        assert!(hits(&fx, config_type(), QueryNode::term("cfg", "com")).is_empty());
    }

    #[test]
    fn attributes() {
        let fx = fixture();
        let q = |field: &str, value: &str| hits(&fx, ObjectType::Object, QueryNode::term(field, value));
        assert_eq!(q("attribute.origin.country", "PL"), vec![fx.config]);
        assert_eq!(q("meta.origin.honeypot", "hp-*"), vec![fx.config]);
        assert_eq!(q("attribute.origin", "hp-01"), vec![fx.config]);
        assert!(q("attribute.other", "*").is_empty());
    }

    // -----------------------------------------------------------------------
    // Relations and cross-type fields
    // -----------------------------------------------------------------------

    #[test]
    fn relations() {
        let fx = fixture();
        let blob = ObjectKind::TextBlob.into();
        assert_eq!(
            hits(&fx, blob, QueryNode::term("parent", &fx.config.to_hex())),
            vec![fx.blob]
        );
        assert_eq!(
            hits(&fx, blob, QueryNode::term("parent.config.family", "emotet")),
            vec![fx.blob]
        );
        assert_eq!(
            hits(&fx, config_type(), QueryNode::term("child.blob.type", "raw_cfg")),
            vec![fx.config]
        );
        assert!(hits(&fx, config_type(), QueryNode::term("parent", "*")).is_empty());
    }

    #[test]
    fn relation_fields_resolve_without_type_prefix() {
        let fx = fixture();
        let blob = ObjectKind::TextBlob.into();
        assert_eq!(
            hits(&fx, blob, QueryNode::term("parent.family", "emotet")),
            vec![fx.blob]
        );
        assert!(hits(&fx, blob, QueryNode::term("parent.family", "qakbot")).is_empty());
        assert_eq!(
            hits(&fx, config_type(), QueryNode::term("child.type", "raw_cfg")),
            vec![fx.config]
        );
    }

    #[test]
    fn cross_type_shorthand_is_scoped() {
        let fx = fixture();
        assert_eq!(
            hits(&fx, ObjectType::Object, QueryNode::term("file.size", "10")),
            vec![fx.file]
        );
        // Resolves, but no config is a file.
        assert!(hits(&fx, config_type(), QueryNode::term("file.size", "10")).is_empty());
    }

    #[test]
    fn boolean_combinations() {
        let fx = fixture();
        let q = QueryNode::and(vec![
            QueryNode::term("uploader", "alice"),
            QueryNode::not(QueryNode::term("tag", "dropper")),
        ]);
        let mut got = hits(&fx, ObjectType::Object, q);
        got.sort();
        let mut expected = vec![fx.blob, fx.config];
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn select_descends_into_arrays() {
        let doc = json!({"a": [{"b": 1}, {"b": 2}, 3]});
        let path = vec![Step::Key("a".into()), Step::Key("b".into())];
        assert_eq!(select(&doc, &path), vec![&json!(1), &json!(2)]);
        assert_eq!(select(&doc, &[Step::Descend]).len(), 7);
    }
}
