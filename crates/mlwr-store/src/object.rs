use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use mlwr_types::{Dhash, ObjectKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A group share of an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Group the object is visible to.
    pub group: String,
    /// Identity that shared the object.
    pub sharer: String,
    pub timestamp: DateTime<Utc>,
}

/// A user comment attached to an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// Metadata shared by every object kind.
///
/// Only metadata may change after creation: shares, tags, comments,
/// attributes, uploaders and parent links only ever grow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub dhash: Dhash,
    pub upload_time: DateTime<Utc>,
    pub share_3rd_party: bool,
    pub shares: Vec<Share>,
    pub tags: BTreeSet<String>,
    pub comments: Vec<Comment>,
    /// Attribute key to the list of values stored under it.
    pub attributes: BTreeMap<String, Vec<Value>>,
    /// Identities that uploaded this content, in first-upload order.
    pub uploaders: Vec<String>,
    pub upload_count: u64,
    pub parents: BTreeSet<Dhash>,
}

impl ObjectMeta {
    pub fn new(dhash: Dhash, now: DateTime<Utc>) -> Self {
        Self {
            dhash,
            upload_time: now,
            share_3rd_party: true,
            shares: Vec::new(),
            tags: BTreeSet::new(),
            comments: Vec::new(),
            attributes: BTreeMap::new(),
            uploaders: Vec::new(),
            upload_count: 0,
            parents: BTreeSet::new(),
        }
    }

    /// Groups the object is shared with, deduplicated.
    pub fn shared_groups(&self) -> BTreeSet<&str> {
        self.shares.iter().map(|s| s.group.as_str()).collect()
    }

    /// Record an upload by `uploader` shared with `groups`.
    pub(crate) fn record_upload(
        &mut self,
        uploader: &str,
        groups: &[String],
        share_3rd_party: bool,
        now: DateTime<Utc>,
    ) {
        self.upload_count += 1;
        if !self.uploaders.iter().any(|u| u == uploader) {
            self.uploaders.push(uploader.to_string());
        }
        for group in groups {
            let already = self
                .shares
                .iter()
                .any(|s| &s.group == group && s.sharer == uploader);
            if !already {
                self.shares.push(Share {
                    group: group.clone(),
                    sharer: uploader.to_string(),
                    timestamp: now,
                });
            }
        }
        // A single upload that forbids third-party sharing wins.
        self.share_3rd_party = self.share_3rd_party && share_3rd_party;
    }
}

/// Binary sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub crc32: String,
    pub ssdeep: Option<String>,
    /// Other names the same content was uploaded under. Append-only.
    pub alt_names: BTreeSet<String>,
}

impl File {
    /// Remember `name` if it differs from the declared name.
    pub(crate) fn add_alt_name(&mut self, name: &str) {
        if name != self.file_name {
            self.alt_names.insert(name.to_string());
        }
    }
}

/// Semi-structured configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub family: String,
    pub config_type: String,
    /// Stored in compact form: blob references hold identifiers.
    pub cfg: Value,
}

/// Textual blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlob {
    pub blob_name: String,
    pub blob_type: String,
    pub content: String,
    pub blob_size: u64,
    pub last_seen: DateTime<Utc>,
}

/// Kind-specific part of an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectBody {
    File(File),
    Config(Config),
    TextBlob(TextBlob),
}

impl ObjectBody {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::File(_) => ObjectKind::File,
            Self::Config(_) => ObjectKind::Config,
            Self::TextBlob(_) => ObjectKind::TextBlob,
        }
    }
}

/// An object as held by a repository.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: ObjectBody,
}

impl StoredObject {
    pub fn dhash(&self) -> Dhash {
        self.meta.dhash
    }

    pub fn kind(&self) -> ObjectKind {
        self.body.kind()
    }

    pub fn as_file(&self) -> Option<&File> {
        match &self.body {
            ObjectBody::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_config(&self) -> Option<&Config> {
        match &self.body {
            ObjectBody::Config(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_text_blob(&self) -> Option<&TextBlob> {
        match &self.body {
            ObjectBody::TextBlob(b) => Some(b),
            _ => None,
        }
    }
}

/// Magic prefixes recognized by [`detect_file_type`].
const MAGIC: &[(&[u8], &str)] = &[
    (b"MZ", "PE32 executable"),
    (b"\x7fELF", "ELF executable"),
    (b"%PDF-", "PDF document"),
    (b"PK\x03\x04", "Zip archive data"),
    (b"\x1f\x8b", "gzip compressed data"),
    (b"Rar!\x1a\x07", "RAR archive data"),
    (b"7z\xbc\xaf\x27\x1c", "7-zip archive data"),
    (b"\xca\xfe\xba\xbe", "Mach-O universal binary"),
    (b"\xcf\xfa\xed\xfe", "Mach-O 64-bit executable"),
    (b"#!", "script text executable"),
];

/// Best-effort type label derived from content magic.
pub fn detect_file_type(data: &[u8]) -> String {
    for (magic, label) in MAGIC {
        if data.starts_with(magic) {
            return (*label).to_string();
        }
    }
    if data.is_empty() {
        "empty".into()
    } else if std::str::from_utf8(data).is_ok() {
        "ASCII text".into()
    } else {
        "data".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ObjectMeta {
        ObjectMeta::new(Dhash::from_digest([1; 32]), Utc::now())
    }

    #[test]
    fn record_upload_deduplicates_uploaders_and_shares() {
        let mut m = meta();
        let now = Utc::now();
        m.record_upload("alice", &["public".into(), "alice".into()], true, now);
        m.record_upload("alice", &["public".into()], true, now);
        m.record_upload("bob", &["public".into()], true, now);

        assert_eq!(m.upload_count, 3);
        assert_eq!(m.uploaders, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(m.shares.len(), 3);
        assert_eq!(m.shared_groups().into_iter().collect::<Vec<_>>(), vec!["alice", "public"]);
    }

    #[test]
    fn third_party_sharing_is_sticky_off() {
        let mut m = meta();
        let now = Utc::now();
        m.record_upload("alice", &[], false, now);
        m.record_upload("bob", &[], true, now);
        assert!(!m.share_3rd_party);
    }

    #[test]
    fn alt_names_skip_declared_name() {
        let mut f = File {
            file_name: "a.exe".into(),
            file_size: 0,
            file_type: "data".into(),
            md5: String::new(),
            sha1: String::new(),
            sha256: String::new(),
            sha512: String::new(),
            crc32: String::new(),
            ssdeep: None,
            alt_names: BTreeSet::new(),
        };
        f.add_alt_name("a.exe");
        f.add_alt_name("b.exe");
        f.add_alt_name("b.exe");
        assert_eq!(f.alt_names.len(), 1);
        assert!(f.alt_names.contains("b.exe"));
    }

    #[test]
    fn detects_common_magic() {
        assert_eq!(detect_file_type(b"MZ\x90\x00"), "PE32 executable");
        assert_eq!(detect_file_type(b"\x7fELF\x02"), "ELF executable");
        assert_eq!(detect_file_type(b"hello"), "ASCII text");
        assert_eq!(detect_file_type(&[0xff, 0xfe, 0x00, 0x81]), "data");
        assert_eq!(detect_file_type(b""), "empty");
    }

    #[test]
    fn body_serializes_with_type_tag() {
        let body = ObjectBody::Config(Config {
            family: "emotet".into(),
            config_type: "static".into(),
            cfg: serde_json::json!({"c2": ["1.2.3.4"]}),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "config");
        assert_eq!(body.kind(), ObjectKind::Config);
    }
}
