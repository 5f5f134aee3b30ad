use std::io::{self, Read};

use mlwr_types::Dhash;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Read buffer used when digesting streams.
const READ_CHUNK: usize = 64 * 1024;

/// Derived hashes of a binary sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    /// Eight lowercase hex digits.
    pub crc32: String,
    pub size: u64,
    dhash: Dhash,
}

impl FileDigests {
    /// Compute every digest over an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        let mut state = DigestState::new();
        state.update(data);
        state.finish()
    }

    /// Compute every digest by streaming from a reader.
    pub fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut state = DigestState::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            state.update(&buf[..n]);
        }
        Ok(state.finish())
    }

    /// The file identifier: the sha256 digest.
    pub fn dhash(&self) -> Dhash {
        self.dhash
    }
}

struct DigestState {
    md5: md5::Context,
    sha1: Sha1,
    sha256: Sha256,
    sha512: Sha512,
    crc32: crc32fast::Hasher,
    size: u64,
}

impl DigestState {
    fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            sha512: Sha512::new(),
            crc32: crc32fast::Hasher::new(),
            size: 0,
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.md5.consume(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
        self.crc32.update(data);
        self.size += data.len() as u64;
    }

    fn finish(self) -> FileDigests {
        let sha256: [u8; 32] = self.sha256.finalize().into();
        FileDigests {
            md5: format!("{:x}", self.md5.compute()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(sha256),
            sha512: hex::encode(self.sha512.finalize()),
            crc32: format!("{:08x}", self.crc32.finalize()),
            size: self.size,
            dhash: Dhash::from_digest(sha256),
        }
    }
}

/// Content-derived identifiers for each object kind.
///
/// - files and text blobs: sha256 of the raw content;
/// - configs: a structural hash of the document in which object keys are
///   sorted and array elements are order-insensitive, so two documents with
///   the same members hash equally regardless of serialization order.
pub struct ContentHasher;

impl ContentHasher {
    /// Identifier of a file.
    pub fn file_dhash(data: &[u8]) -> Dhash {
        Self::raw_sha256(data)
    }

    /// Identifier of a text blob.
    pub fn blob_dhash(content: &str) -> Dhash {
        Self::raw_sha256(content.as_bytes())
    }

    /// Identifier of a config document (compact `in-blob` form).
    pub fn config_dhash(cfg: &Value) -> Dhash {
        Dhash::from_digest(structural_digest(cfg))
    }

    /// Plain SHA-256.
    pub fn raw_sha256(data: &[u8]) -> Dhash {
        Dhash::from_digest(Sha256::digest(data).into())
    }
}

fn sha256_text(text: &str) -> [u8; 32] {
    Sha256::digest(text.as_bytes()).into()
}

/// Recursive structural hash.
///
/// Scalars hash their textual rendering (`True`/`False`/`None` for the JSON
/// literals). Arrays hash the list representation of their sorted element
/// hashes in hex. Objects hash as an array of `[key, value-hash]` pairs.
fn structural_digest(value: &Value) -> [u8; 32] {
    match value {
        Value::Array(items) => {
            let mut hashes: Vec<String> = items
                .iter()
                .map(|item| hex::encode(structural_digest(item)))
                .collect();
            hashes.sort();
            sha256_text(&render_list(&hashes))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let pairs: Vec<Value> = keys
                .into_iter()
                .map(|key| {
                    Value::Array(vec![
                        Value::String(key.clone()),
                        Value::String(hex::encode(structural_digest(&map[key]))),
                    ])
                })
                .collect();
            structural_digest(&Value::Array(pairs))
        }
        Value::String(s) => sha256_text(s),
        Value::Bool(true) => sha256_text("True"),
        Value::Bool(false) => sha256_text("False"),
        Value::Null => sha256_text("None"),
        Value::Number(n) => sha256_text(&n.to_string()),
    }
}

fn render_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_vectors_for_abc() {
        let d = FileDigests::compute(b"abc");
        assert_eq!(d.md5, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(d.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            d.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(d.sha512.len(), 128);
        assert_eq!(d.crc32, "352441c2");
        assert_eq!(d.size, 3);
    }

    #[test]
    fn streaming_matches_in_memory() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = FileDigests::from_reader(&mut data.as_slice()).unwrap();
        assert_eq!(streamed, FileDigests::compute(&data));
    }

    #[test]
    fn file_dhash_is_sha256() {
        let d = FileDigests::compute(b"sample");
        assert_eq!(d.dhash(), ContentHasher::file_dhash(b"sample"));
        assert_eq!(d.dhash().to_hex(), d.sha256);
    }

    #[test]
    fn blob_dhash_is_content_sha256() {
        assert_eq!(
            ContentHasher::blob_dhash("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn config_dhash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"x": "y", "z": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"z": null, "x": "y"}, "a": 1}"#).unwrap();
        assert_eq!(ContentHasher::config_dhash(&a), ContentHasher::config_dhash(&b));
    }

    #[test]
    fn config_dhash_ignores_array_order() {
        let a = json!({"urls": ["http://a", "http://b"]});
        let b = json!({"urls": ["http://b", "http://a"]});
        assert_eq!(ContentHasher::config_dhash(&a), ContentHasher::config_dhash(&b));
    }

    #[test]
    fn config_dhash_distinguishes_values() {
        let a = json!({"port": 80});
        let b = json!({"port": 81});
        let c = json!({"port": "80"});
        assert_ne!(ContentHasher::config_dhash(&a), ContentHasher::config_dhash(&b));
        // Numbers and their string rendering hash alike, as scalars hash text.
        assert_eq!(ContentHasher::config_dhash(&a), ContentHasher::config_dhash(&c));
    }

    #[test]
    fn config_dhash_scalar_literals() {
        assert_ne!(
            ContentHasher::config_dhash(&json!({"k": true})),
            ContentHasher::config_dhash(&json!({"k": false}))
        );
        assert_ne!(
            ContentHasher::config_dhash(&json!({"k": null})),
            ContentHasher::config_dhash(&json!({"k": "null"}))
        );
    }

    #[test]
    fn render_list_matches_list_repr() {
        assert_eq!(render_list(&[]), "[]");
        assert_eq!(render_list(&["a".into(), "b".into()]), "['a', 'b']");
    }
}
