//! `in-blob` references inside config documents.
//!
//! A JSON object whose only key is `in-blob` refers to a text blob, either
//! by identifier (compact form) or by inline content (expanded form):
//!
//! ```json
//! {"c2": {"in-blob": "9f86d081..."}}
//! {"c2": {"in-blob": {"content": "1.2.3.4", "blob_name": "c2.txt", "blob_type": "raw_cfg"}}}
//! ```
//!
//! References are found at any depth, inside objects or arrays.

use mlwr_types::Dhash;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};

pub const IN_BLOB: &str = "in-blob";

/// Inline blob content of an expanded reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlineBlob {
    pub content: String,
    pub blob_name: String,
    pub blob_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlobRef {
    Compact(Dhash),
    Inline(InlineBlob),
}

impl BlobRef {
    /// Interpret a JSON object. `Ok(None)` when it is not a reference.
    pub fn from_object(map: &Map<String, Value>) -> ProtocolResult<Option<Self>> {
        let Some(value) = map.get(IN_BLOB) else {
            return Ok(None);
        };
        if map.len() != 1 {
            return Err(ProtocolError::InvalidReference(format!(
                "'{IN_BLOB}' must be the only key of its object"
            )));
        }
        let reference = match value {
            Value::String(id) => Self::Compact(Dhash::from_hex(id).map_err(|e| {
                ProtocolError::InvalidReference(format!("{id:?} is not a blob identifier: {e}"))
            })?),
            Value::Object(_) => Self::Inline(
                InlineBlob::deserialize(value)
                    .map_err(|e| ProtocolError::InvalidReference(format!("inline blob: {e}")))?,
            ),
            _ => {
                return Err(ProtocolError::InvalidReference(
                    "value must be a blob identifier or an inline blob".into(),
                ))
            }
        };
        Ok(Some(reference))
    }

    /// The `{"in-blob": ...}` object.
    pub fn to_value(&self) -> Value {
        let inner = match self {
            Self::Compact(id) => Value::String(id.to_hex()),
            Self::Inline(blob) => serde_json::json!({
                "content": blob.content,
                "blob_name": blob.blob_name,
                "blob_type": blob.blob_type,
            }),
        };
        let mut map = Map::new();
        map.insert(IN_BLOB.to_string(), inner);
        Value::Object(map)
    }
}

/// Every reference in `doc`, in document order. Fails on the first
/// malformed reference.
pub fn collect_refs(doc: &Value) -> ProtocolResult<Vec<BlobRef>> {
    let mut refs = Vec::new();
    walk(doc, &mut |r: &BlobRef| {
        refs.push(r.clone());
        Ok::<_, ProtocolError>(())
    })?;
    Ok(refs)
}

fn walk<E, F>(value: &Value, visit: &mut F) -> Result<(), E>
where
    E: From<ProtocolError>,
    F: FnMut(&BlobRef) -> Result<(), E>,
{
    match value {
        Value::Object(map) => match BlobRef::from_object(map)? {
            Some(reference) => visit(&reference),
            None => map.values().try_for_each(|v| walk(v, visit)),
        },
        Value::Array(items) => items.iter().try_for_each(|v| walk(v, visit)),
        _ => Ok(()),
    }
}

/// A copy of `doc` where each reference is replaced by `replace(reference)`.
/// The input is left untouched.
pub fn rewrite_refs<E, F>(doc: &Value, replace: &mut F) -> Result<Value, E>
where
    E: From<ProtocolError>,
    F: FnMut(&BlobRef) -> Result<Value, E>,
{
    Ok(match doc {
        Value::Object(map) => match BlobRef::from_object(map)? {
            Some(reference) => replace(&reference)?,
            None => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), rewrite_refs(v, replace)?)))
                    .collect::<Result<Map<_, _>, E>>()?,
            ),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| rewrite_refs(v, replace))
                .collect::<Result<Vec<_>, E>>()?,
        ),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(byte: u8) -> Dhash {
        Dhash::from_digest([byte; 32])
    }

    fn inline(content: &str) -> Value {
        json!({"in-blob": {"content": content, "blob_name": "n", "blob_type": "t"}})
    }

    #[test]
    fn collects_nested_references() {
        let doc = json!({
            "c2": {"in-blob": id(1).to_hex()},
            "list": [inline("a"), {"deep": [inline("b")]}],
            "plain": {"x": 1},
        });
        let refs = collect_refs(&doc).unwrap();
        assert_eq!(refs.len(), 3);
        assert!(refs.contains(&BlobRef::Compact(id(1))));
        assert!(refs.iter().any(|r| matches!(r, BlobRef::Inline(b) if b.content == "b")));
    }

    #[test]
    fn rejects_malformed_references() {
        for doc in [
            json!({"c2": {"in-blob": id(1).to_hex(), "other": 1}}),
            json!({"c2": {"in-blob": 5}}),
            json!({"c2": {"in-blob": null}}),
            json!({"c2": {"in-blob": "not-hex"}}),
            json!({"c2": {"in-blob": {"content": "x"}}}),
            json!([{"in-blob": []}]),
        ] {
            assert!(
                matches!(collect_refs(&doc), Err(ProtocolError::InvalidReference(_))),
                "{doc}"
            );
        }
    }

    #[test]
    fn rewrite_replaces_and_keeps_input() {
        let doc = json!({"a": [inline("x")], "b": "keep"});
        let original = doc.clone();
        let out = rewrite_refs(&doc, &mut |_r: &BlobRef| {
            Ok::<_, ProtocolError>(BlobRef::Compact(id(7)).to_value())
        })
        .unwrap();
        assert_eq!(out, json!({"a": [{"in-blob": id(7).to_hex()}], "b": "keep"}));
        assert_eq!(doc, original);
    }

    #[test]
    fn inline_form_round_trips() {
        let value = inline("1.2.3.4");
        let reference = BlobRef::from_object(value.as_object().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(reference.to_value(), value);
    }

    #[test]
    fn plain_objects_are_not_references() {
        let value = json!({"blob": "x"});
        assert_eq!(BlobRef::from_object(value.as_object().unwrap()).unwrap(), None);
    }
}
