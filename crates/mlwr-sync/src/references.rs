//! Resolution of `in-blob` references inside config documents.
//!
//! Uploading a config is a two-pass transform. [`ReferencePlan::collect`]
//! walks the document once, validating every reference and deciding which
//! local blob it resolves to: an existing blob for a compact reference, a
//! staged blob for an inline one. Identifiers are content hashes, so they
//! are known before anything is written. [`ReferencePlan::rewrite`] then
//! builds the compact document that is actually stored.

use std::collections::{BTreeSet, HashMap};

use mlwr_crypto::ContentHasher;
use mlwr_protocol::{collect_refs, rewrite_refs, BlobRef, InlineBlob};
use mlwr_store::{NewObject, ObjectRepository, WriteBatch};
use mlwr_types::{Dhash, ObjectKind};
use serde_json::Value;

use crate::error::{RemoteError, SyncError, SyncResult};

#[derive(Debug, Default)]
pub struct ReferencePlan {
    resolved: HashMap<BlobRef, Dhash>,
    staged: Vec<NewObject>,
    missing: Vec<Dhash>,
}

impl ReferencePlan {
    /// First pass over `cfg`. Compact references to blobs absent from `repo`
    /// are reported by [`missing`](Self::missing).
    pub fn collect<R: ObjectRepository + ?Sized>(repo: &R, cfg: &Value) -> SyncResult<Self> {
        let mut plan = Self::default();
        for reference in collect_refs(cfg)? {
            if plan.resolved.contains_key(&reference) {
                continue;
            }
            match reference {
                BlobRef::Compact(id) => {
                    if repo.access(ObjectKind::TextBlob, &id)?.is_some() {
                        plan.resolved.insert(BlobRef::Compact(id), id);
                    } else if !plan.missing.contains(&id) {
                        plan.missing.push(id);
                    }
                }
                BlobRef::Inline(blob) => {
                    let dhash = plan.stage(&blob);
                    plan.resolved.insert(BlobRef::Inline(blob), dhash);
                }
            }
        }
        Ok(plan)
    }

    fn stage(&mut self, blob: &InlineBlob) -> Dhash {
        let object = NewObject::text_blob(&blob.blob_name, &blob.blob_type, &blob.content);
        let dhash = object.dhash();
        if !self.staged.iter().any(|o| o.dhash() == dhash) {
            self.staged.push(object);
        }
        dhash
    }

    /// Compact references without a local blob, in document order.
    pub fn missing(&self) -> &[Dhash] {
        &self.missing
    }

    /// Resolve a missing compact reference with content obtained elsewhere.
    ///
    /// The content must hash to `requested`; the plan is left untouched
    /// otherwise.
    pub fn supply(&mut self, requested: Dhash, blob: InlineBlob) -> SyncResult<Dhash> {
        let computed = ContentHasher::blob_dhash(&blob.content);
        if computed != requested {
            tracing::warn!(%requested, %computed, "supplied blob content does not match its identifier");
            return Err(SyncError::Remote(RemoteError::Decode(format!(
                "blob {requested} has content hashing to {computed}"
            ))));
        }
        self.missing.retain(|id| *id != requested);
        let dhash = self.stage(&blob);
        self.resolved.insert(BlobRef::Compact(requested), dhash);
        Ok(dhash)
    }

    /// Blobs to create or reuse.
    pub fn staged(&self) -> &[NewObject] {
        &self.staged
    }

    /// Whether applying the plan creates at least one blob.
    pub fn creates_blobs<R: ObjectRepository + ?Sized>(&self, repo: &R) -> SyncResult<bool> {
        for object in &self.staged {
            if repo.get(&object.dhash())?.is_none() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Local identifiers of every referenced blob.
    pub fn children(&self) -> BTreeSet<Dhash> {
        self.resolved.values().copied().collect()
    }

    /// Second pass: a copy of `cfg` where every reference is compact and
    /// names the resolved local blob.
    pub fn rewrite(&self, cfg: &Value) -> SyncResult<Value> {
        rewrite_refs(cfg, &mut |reference: &BlobRef| {
            match self.resolved.get(reference) {
                Some(dhash) => Ok(BlobRef::Compact(*dhash).to_value()),
                None => Err(SyncError::BlobNotFound(reference_id(reference))),
            }
        })
    }

    /// Stage the blobs into `batch` and link each referenced blob to
    /// `parent`.
    pub fn stage_into(self, batch: &mut WriteBatch, parent: Dhash) {
        let children = self.children();
        for object in self.staged {
            batch.add_object(object);
        }
        for child in children {
            batch.add_link(parent, child);
        }
    }
}

fn reference_id(reference: &BlobRef) -> Dhash {
    match reference {
        BlobRef::Compact(id) => *id,
        BlobRef::Inline(blob) => ContentHasher::blob_dhash(&blob.content),
    }
}

/// Replace every compact reference in `cfg` by the inline form of the
/// local blob it names. Inline references are kept as they are.
pub fn expand_references<R: ObjectRepository + ?Sized>(repo: &R, cfg: &Value) -> SyncResult<Value> {
    collect_refs(cfg)?;
    rewrite_refs(cfg, &mut |reference: &BlobRef| match reference {
        BlobRef::Compact(id) => {
            let blob = repo
                .access(ObjectKind::TextBlob, id)?
                .and_then(|obj| obj.as_text_blob().cloned())
                .ok_or(SyncError::BlobNotFound(*id))?;
            Ok(BlobRef::Inline(InlineBlob {
                content: blob.content,
                blob_name: blob.blob_name,
                blob_type: blob.blob_type,
            })
            .to_value())
        }
        BlobRef::Inline(_) => Ok(reference.to_value()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlwr_store::{InMemoryRepository, UploadContext};
    use serde_json::json;

    fn repo_with_blob(content: &str) -> (InMemoryRepository, Dhash) {
        let repo = InMemoryRepository::new();
        let mut batch = WriteBatch::new(UploadContext::new("alice", vec![]));
        let id = batch.add_object(NewObject::text_blob("stored.txt", "raw_cfg", content));
        repo.apply(batch).unwrap();
        (repo, id)
    }

    fn inline(content: &str) -> Value {
        json!({"in-blob": {"content": content, "blob_name": "c2.txt", "blob_type": "raw_cfg"}})
    }

    #[test]
    fn inline_references_are_staged_and_rewritten() {
        let repo = InMemoryRepository::new();
        let cfg = json!({"c2": inline("1.2.3.4"), "other": [inline("1.2.3.4")]});
        let plan = ReferencePlan::collect(&repo, &cfg).unwrap();
        let blob_id = ContentHasher::blob_dhash("1.2.3.4");

        assert_eq!(plan.staged().len(), 1);
        assert!(plan.missing().is_empty());
        assert!(plan.creates_blobs(&repo).unwrap());
        assert_eq!(
            plan.rewrite(&cfg).unwrap(),
            json!({"c2": {"in-blob": blob_id.to_hex()}, "other": [{"in-blob": blob_id.to_hex()}]})
        );
        assert_eq!(plan.children().into_iter().collect::<Vec<_>>(), vec![blob_id]);
    }

    #[test]
    fn compact_references_resolve_locally() {
        let (repo, id) = repo_with_blob("x");
        let cfg = json!({"c2": {"in-blob": id.to_hex()}});
        let plan = ReferencePlan::collect(&repo, &cfg).unwrap();
        assert!(plan.staged().is_empty());
        assert!(!plan.creates_blobs(&repo).unwrap());
        assert_eq!(plan.rewrite(&cfg).unwrap(), cfg);
    }

    #[test]
    fn missing_blob_until_supplied() {
        let repo = InMemoryRepository::new();
        let id = ContentHasher::blob_dhash("remote content");
        let cfg = json!({"c2": {"in-blob": id.to_hex()}});
        let mut plan = ReferencePlan::collect(&repo, &cfg).unwrap();
        assert_eq!(plan.missing(), &[id]);
        assert!(matches!(plan.rewrite(&cfg), Err(SyncError::BlobNotFound(m)) if m == id));

        let resolved = plan.supply(
            id,
            InlineBlob {
                content: "remote content".into(),
                blob_name: "c2.txt".into(),
                blob_type: "raw_cfg".into(),
            },
        );
        assert_eq!(resolved.unwrap(), id);
        assert!(plan.missing().is_empty());
        assert_eq!(plan.rewrite(&cfg).unwrap(), cfg);
    }

    #[test]
    fn supplied_content_must_match_identifier() {
        let repo = InMemoryRepository::new();
        let id = ContentHasher::blob_dhash("remote content");
        let cfg = json!({"c2": {"in-blob": id.to_hex()}});
        let mut plan = ReferencePlan::collect(&repo, &cfg).unwrap();

        let err = plan
            .supply(
                id,
                InlineBlob {
                    content: "something else".into(),
                    blob_name: "c2.txt".into(),
                    blob_type: "raw_cfg".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Decode(_))));
        assert_eq!(plan.missing(), &[id]);
        assert!(plan.staged().is_empty());
    }

    #[test]
    fn existing_inline_content_is_not_a_creation() {
        let (repo, id) = repo_with_blob("1.2.3.4");
        let plan = ReferencePlan::collect(&repo, &json!({"c2": inline("1.2.3.4")})).unwrap();
        assert!(!plan.creates_blobs(&repo).unwrap());
        assert!(plan.children().contains(&id));
    }

    #[test]
    fn malformed_reference_is_bad_request() {
        let repo = InMemoryRepository::new();
        let cfg = json!({"c2": {"in-blob": "ab", "other": 1}});
        assert!(matches!(
            ReferencePlan::collect(&repo, &cfg),
            Err(SyncError::BadRequest(_))
        ));
        assert!(matches!(
            expand_references(&repo, &cfg),
            Err(SyncError::BadRequest(_))
        ));
    }

    #[test]
    fn stage_into_links_children() {
        let (repo, stored) = repo_with_blob("kept");
        let cfg = json!({"a": {"in-blob": stored.to_hex()}, "b": inline("new")});
        let plan = ReferencePlan::collect(&repo, &cfg).unwrap();
        let rewritten = plan.rewrite(&cfg).unwrap();

        let mut batch = WriteBatch::new(UploadContext::new("alice", vec![]));
        let parent = batch.add_object(NewObject::config("fam", "static", rewritten));
        plan.stage_into(&mut batch, parent);
        assert_eq!(batch.objects.len(), 2);
        assert_eq!(batch.links.len(), 2);

        repo.apply(batch).unwrap();
        let mut children = repo.children(&parent).unwrap();
        children.sort();
        let mut expected = vec![stored, ContentHasher::blob_dhash("new")];
        expected.sort();
        assert_eq!(children, expected);
    }

    #[test]
    fn expand_inlines_local_blobs() {
        let (repo, id) = repo_with_blob("1.2.3.4");
        let cfg = json!({"c2": {"in-blob": id.to_hex()}, "n": 1});
        assert_eq!(
            expand_references(&repo, &cfg).unwrap(),
            json!({
                "c2": {"in-blob": {"content": "1.2.3.4", "blob_name": "stored.txt", "blob_type": "raw_cfg"}},
                "n": 1
            })
        );

        let dangling = Dhash::from_digest([3; 32]);
        assert!(matches!(
            expand_references(&repo, &json!({"c2": {"in-blob": dangling.to_hex()}})),
            Err(SyncError::BlobNotFound(d)) if d == dangling
        ));
    }
}
