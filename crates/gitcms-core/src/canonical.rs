//! Deterministic collection file encoding
//!
//! Collection files are written with object keys sorted at every depth,
//! two-space indentation and a trailing newline, so equal content always
//! produces byte-identical blobs and unchanged collections never show up in
//! a diff.

use crate::errors::{CmsError, ErrorKind, Result};
use crate::model::{CollectionKind, CollectionShape, Document, SnapshotContent};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Serialize collection content to its on-disk form
///
/// # Errors
///
/// `Serialization` if the JSON encoder fails.
pub fn serialize_content(content: &SnapshotContent) -> Result<Vec<u8>> {
    let value = match content {
        SnapshotContent::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        SnapshotContent::Singleton(doc) => sorted(doc),
    };
    let mut bytes = serde_json::to_vec_pretty(&value).map_err(|e| {
        CmsError::new(ErrorKind::Serialization)
            .with_op("serialize_content")
            .with_message(e.to_string())
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse a collection file fetched from the store
///
/// # Errors
///
/// `Serialization` if the bytes are not JSON, or if the top-level value does
/// not match the collection's shape (array vs. object).
pub fn parse_content(kind: CollectionKind, bytes: &[u8]) -> Result<SnapshotContent> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        CmsError::new(ErrorKind::Serialization)
            .with_op("parse_content")
            .with_collection(kind)
            .with_message(format!("Collection file is not valid JSON: {}", e))
    })?;

    match (kind.shape(), value) {
        (CollectionShape::Array, Value::Array(items)) => Ok(SnapshotContent::Array(items)),
        (CollectionShape::Singleton, doc @ Value::Object(_)) => Ok(SnapshotContent::Singleton(doc)),
        (shape, _) => Err(CmsError::new(ErrorKind::Serialization)
            .with_op("parse_content")
            .with_collection(kind)
            .with_message(format!(
                "Expected {} at top level of {}",
                match shape {
                    CollectionShape::Array => "a JSON array",
                    CollectionShape::Singleton => "a JSON object",
                },
                kind.path()
            ))),
    }
}

/// SHA-256 of `bytes`, hex encoded
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Copy of `value` with object keys inserted in sorted order at every depth
fn sorted(value: &Document) -> Document {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
