use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use mlwr_crypto::{ContentHasher, FileDigests};
use mlwr_types::{Dhash, ObjectKind};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::object::{detect_file_type, Config, File, ObjectBody, StoredObject, TextBlob};

/// File content to be materialized, with its digests precomputed.
#[derive(Clone, Debug)]
pub struct NewFile {
    pub file_name: String,
    pub data: Vec<u8>,
    pub digests: FileDigests,
    pub ssdeep: Option<String>,
}

impl NewFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let digests = FileDigests::compute(&data);
        Self {
            file_name: file_name.into(),
            data,
            digests,
            ssdeep: None,
        }
    }
}

/// Content of an object to create or reuse.
#[derive(Clone, Debug)]
pub enum NewObject {
    File(NewFile),
    Config {
        family: String,
        config_type: String,
        /// Compact form: every blob reference holds an identifier.
        cfg: Value,
    },
    TextBlob {
        blob_name: String,
        blob_type: String,
        content: String,
    },
}

impl NewObject {
    pub fn file(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::File(NewFile::new(file_name, data))
    }

    pub fn config(family: impl Into<String>, config_type: impl Into<String>, cfg: Value) -> Self {
        Self::Config {
            family: family.into(),
            config_type: config_type.into(),
            cfg,
        }
    }

    pub fn text_blob(
        blob_name: impl Into<String>,
        blob_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::TextBlob {
            blob_name: blob_name.into(),
            blob_type: blob_type.into(),
            content: content.into(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::File(_) => ObjectKind::File,
            Self::Config { .. } => ObjectKind::Config,
            Self::TextBlob { .. } => ObjectKind::TextBlob,
        }
    }

    /// Content-derived identifier the object will have once stored.
    pub fn dhash(&self) -> Dhash {
        match self {
            Self::File(f) => f.digests.dhash(),
            Self::Config { cfg, .. } => ContentHasher::config_dhash(cfg),
            Self::TextBlob { content, .. } => ContentHasher::blob_dhash(content),
        }
    }

    /// Check the invariants every backend relies on.
    pub fn validate(&self) -> StoreResult<()> {
        match self {
            Self::File(f) if f.file_name.is_empty() => {
                Err(StoreError::InvalidObject("file name must not be empty".into()))
            }
            Self::Config { cfg, .. } if !cfg.is_object() => {
                Err(StoreError::InvalidObject("config must be a JSON object".into()))
            }
            Self::Config { family, .. } if family.is_empty() => {
                Err(StoreError::InvalidObject("config family must not be empty".into()))
            }
            Self::TextBlob { blob_name, .. } if blob_name.is_empty() => {
                Err(StoreError::InvalidObject("blob name must not be empty".into()))
            }
            Self::TextBlob { blob_type, .. } if blob_type.is_empty() => {
                Err(StoreError::InvalidObject("blob type must not be empty".into()))
            }
            _ => Ok(()),
        }
    }

    /// Build the kind-specific body of a freshly created object.
    pub(crate) fn to_body(&self, now: DateTime<Utc>) -> ObjectBody {
        match self {
            Self::File(f) => ObjectBody::File(File {
                file_name: f.file_name.clone(),
                file_size: f.digests.size,
                file_type: detect_file_type(&f.data),
                md5: f.digests.md5.clone(),
                sha1: f.digests.sha1.clone(),
                sha256: f.digests.sha256.clone(),
                sha512: f.digests.sha512.clone(),
                crc32: f.digests.crc32.clone(),
                ssdeep: f.ssdeep.clone(),
                alt_names: BTreeSet::new(),
            }),
            Self::Config {
                family,
                config_type,
                cfg,
            } => ObjectBody::Config(Config {
                family: family.clone(),
                config_type: config_type.clone(),
                cfg: cfg.clone(),
            }),
            Self::TextBlob {
                blob_name,
                blob_type,
                content,
            } => ObjectBody::TextBlob(TextBlob {
                blob_name: blob_name.clone(),
                blob_type: blob_type.clone(),
                content: content.clone(),
                blob_size: content.len() as u64,
                last_seen: now,
            }),
        }
    }
}

/// Who uploads a batch and with whom it is shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadContext {
    pub uploader: String,
    pub share_with: Vec<String>,
    pub share_3rd_party: bool,
}

impl UploadContext {
    pub fn new(uploader: impl Into<String>, share_with: Vec<String>) -> Self {
        Self {
            uploader: uploader.into(),
            share_with,
            share_3rd_party: true,
        }
    }

    pub fn with_share_3rd_party(mut self, share_3rd_party: bool) -> Self {
        self.share_3rd_party = share_3rd_party;
        self
    }
}

/// Parent/child edge: `child.parents` gains `parent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub parent: Dhash,
    pub child: Dhash,
}

/// A set of objects and edges applied atomically.
///
/// Backends validate the whole batch (kind conflicts, dangling edges)
/// before writing anything.
#[derive(Clone, Debug)]
pub struct WriteBatch {
    pub context: UploadContext,
    pub objects: Vec<NewObject>,
    pub links: Vec<Link>,
}

impl WriteBatch {
    pub fn new(context: UploadContext) -> Self {
        Self {
            context,
            objects: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Stage an object and return the identifier it will have.
    pub fn add_object(&mut self, object: NewObject) -> Dhash {
        let dhash = object.dhash();
        self.objects.push(object);
        dhash
    }

    /// Stage a parent/child edge.
    pub fn add_link(&mut self, parent: Dhash, child: Dhash) {
        let link = Link { parent, child };
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.links.is_empty()
    }
}

/// Outcome of materializing one object of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Materialized {
    pub object: StoredObject,
    /// `false` when the content already existed and was reused.
    pub is_new: bool,
}

/// Metadata that can be attached to an existing object.
#[derive(Clone, Debug, PartialEq)]
pub enum Annotation {
    Tag(String),
    Comment { author: String, comment: String },
    Attribute { key: String, value: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dhash_matches_content_hasher() {
        let blob = NewObject::text_blob("c2.txt", "raw_cfg", "1.2.3.4");
        assert_eq!(blob.dhash(), ContentHasher::blob_dhash("1.2.3.4"));

        let file = NewObject::file("a.bin", b"MZ".to_vec());
        assert_eq!(file.dhash(), ContentHasher::file_dhash(b"MZ"));

        let cfg = json!({"c2": "x"});
        let config = NewObject::config("fam", "static", cfg.clone());
        assert_eq!(config.dhash(), ContentHasher::config_dhash(&cfg));
    }

    #[test]
    fn validate_rejects_malformed_objects() {
        assert!(NewObject::config("fam", "static", json!([1, 2])).validate().is_err());
        assert!(NewObject::config("", "static", json!({})).validate().is_err());
        assert!(NewObject::text_blob("", "t", "x").validate().is_err());
        assert!(NewObject::text_blob("n", "", "x").validate().is_err());
        assert!(NewObject::file("", vec![1]).validate().is_err());
        assert!(NewObject::text_blob("n", "t", "x").validate().is_ok());
    }

    #[test]
    fn batch_deduplicates_links() {
        let mut batch = WriteBatch::new(UploadContext::new("alice", vec![]));
        let a = batch.add_object(NewObject::text_blob("a", "t", "a"));
        let b = batch.add_object(NewObject::text_blob("b", "t", "b"));
        batch.add_link(a, b);
        batch.add_link(a, b);
        assert_eq!(batch.links.len(), 1);
        assert!(!batch.is_empty());
    }

    #[test]
    fn blob_body_records_size() {
        let body = NewObject::text_blob("n", "t", "héllo").to_body(Utc::now());
        match body {
            ObjectBody::TextBlob(b) => assert_eq!(b.blob_size, 6),
            other => panic!("unexpected body {other:?}"),
        }
    }
}
