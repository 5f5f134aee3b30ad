//! Public item representations returned by the object endpoints.

use chrono::{DateTime, Utc};
use mlwr_store::{ObjectBody, ObjectMeta, StoredObject};
use mlwr_types::{Dhash, ObjectKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: Dhash,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub crc32: String,
    #[serde(default)]
    pub ssdeep: Option<String>,
    #[serde(default)]
    pub alt_names: Vec<String>,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
    pub upload_time: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parents: Vec<Dhash>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub id: Dhash,
    pub family: String,
    pub config_type: String,
    pub cfg: Value,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
    pub upload_time: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parents: Vec<Dhash>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobItem {
    pub id: Dhash,
    pub blob_name: String,
    pub blob_type: String,
    pub content: String,
    pub blob_size: u64,
    pub last_seen: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
    pub upload_time: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parents: Vec<Dhash>,
}

/// Any item, tagged with its kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectItem {
    File(FileItem),
    Config(ConfigItem),
    TextBlob(BlobItem),
}

impl ObjectItem {
    pub fn id(&self) -> Dhash {
        match self {
            Self::File(f) => f.id,
            Self::Config(c) => c.id,
            Self::TextBlob(b) => b.id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::File(_) => ObjectKind::File,
            Self::Config(_) => ObjectKind::Config,
            Self::TextBlob(_) => ObjectKind::TextBlob,
        }
    }

    /// The untagged per-kind representation served by `GET {kind}/{id}`.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::File(f) => serde_json::to_value(f),
            Self::Config(c) => serde_json::to_value(c),
            Self::TextBlob(b) => serde_json::to_value(b),
        }
    }
}

fn tags(meta: &ObjectMeta) -> Vec<String> {
    meta.tags.iter().cloned().collect()
}

fn parents(meta: &ObjectMeta) -> Vec<Dhash> {
    meta.parents.iter().copied().collect()
}

impl From<&StoredObject> for ObjectItem {
    fn from(object: &StoredObject) -> Self {
        let meta = &object.meta;
        match &object.body {
            ObjectBody::File(f) => Self::File(FileItem {
                id: meta.dhash,
                file_name: f.file_name.clone(),
                file_size: f.file_size,
                file_type: f.file_type.clone(),
                md5: f.md5.clone(),
                sha1: f.sha1.clone(),
                sha256: f.sha256.clone(),
                sha512: f.sha512.clone(),
                crc32: f.crc32.clone(),
                ssdeep: f.ssdeep.clone(),
                alt_names: f.alt_names.iter().cloned().collect(),
                share_3rd_party: meta.share_3rd_party,
                upload_time: meta.upload_time,
                tags: tags(meta),
                parents: parents(meta),
            }),
            ObjectBody::Config(c) => Self::Config(ConfigItem {
                id: meta.dhash,
                family: c.family.clone(),
                config_type: c.config_type.clone(),
                cfg: c.cfg.clone(),
                share_3rd_party: meta.share_3rd_party,
                upload_time: meta.upload_time,
                tags: tags(meta),
                parents: parents(meta),
            }),
            ObjectBody::TextBlob(b) => Self::TextBlob(BlobItem {
                id: meta.dhash,
                blob_name: b.blob_name.clone(),
                blob_type: b.blob_type.clone(),
                content: b.content.clone(),
                blob_size: b.blob_size,
                last_seen: b.last_seen,
                share_3rd_party: meta.share_3rd_party,
                upload_time: meta.upload_time,
                tags: tags(meta),
                parents: parents(meta),
            }),
        }
    }
}
