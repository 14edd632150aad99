//! Edits and documents

use crate::errors::{CmsError, ErrorKind, Result};
use crate::model::CollectionKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An open-ended JSON record
pub type Document = serde_json::Value;

/// The only structurally significant field of an array record
pub const ID_FIELD: &str = "id";

/// Read a document's `id`, if it has a string one
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(|v| v.as_str())
}

/// Requested mutation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Parse a wire tag. This is the only place an unrecognized operation can
    /// enter the system; everything downstream works on the closed enum.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for any tag other than `create`, `update`, `delete`.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(CmsError::new(ErrorKind::InvalidOperation)
                .with_op("parse_operation")
                .with_message(format!("Unknown operation '{}'", other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::parse(s)
    }
}

/// One requested mutation against one record of one collection
///
/// `id` duplicates `data.id` for create/update and is the authoritative key
/// for delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub id: String,
    pub collection: CollectionKind,
    pub operation: Operation,
    pub data: Document,
}

impl Edit {
    pub fn new(
        collection: CollectionKind,
        operation: Operation,
        id: impl Into<String>,
        data: Document,
    ) -> Self {
        Self {
            id: id.into(),
            collection,
            operation,
            data,
        }
    }

    /// Create edit keyed by `data.id` (empty id for singletons)
    pub fn create(collection: CollectionKind, data: Document) -> Self {
        let id = document_id(&data).unwrap_or_default().to_string();
        Self::new(collection, Operation::Create, id, data)
    }

    /// Update edit keyed by `data.id` (empty id for singletons)
    pub fn update(collection: CollectionKind, data: Document) -> Self {
        let id = document_id(&data).unwrap_or_default().to_string();
        Self::new(collection, Operation::Update, id, data)
    }

    pub fn delete(collection: CollectionKind, id: impl Into<String>) -> Self {
        let id = id.into();
        let data = serde_json::json!({ ID_FIELD: id });
        Self::new(collection, Operation::Delete, id, data)
    }

    /// Identifier used to locate the target record
    ///
    /// Create/update trust `data.id` and fall back to `id`; delete trusts `id`
    /// and falls back to `data.id`.
    pub fn match_key(&self) -> &str {
        let data_id = document_id(&self.data);
        match self.operation {
            Operation::Create | Operation::Update => data_id.unwrap_or(&self.id),
            Operation::Delete if self.id.is_empty() => data_id.unwrap_or(""),
            Operation::Delete => &self.id,
        }
    }
}

/// Group a batch by collection, preserving submission order within each group
pub fn group_by_collection(edits: &[Edit]) -> BTreeMap<CollectionKind, Vec<Edit>> {
    let mut groups: BTreeMap<CollectionKind, Vec<Edit>> = BTreeMap::new();
    for edit in edits {
        groups.entry(edit.collection).or_default().push(edit.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_operation() {
        assert_eq!(Operation::parse("create").unwrap(), Operation::Create);
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
    }

    #[test]
    fn test_unknown_operation_fails_loudly() {
        let err = Operation::parse("upsert").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.message().contains("upsert"));
    }

    #[test]
    fn test_match_key_prefers_data_id_for_update() {
        let edit = Edit::new(
            CollectionKind::Videos,
            Operation::Update,
            "stale",
            json!({"id": "v1"}),
        );
        assert_eq!(edit.match_key(), "v1");
    }

    #[test]
    fn test_match_key_falls_back_to_edit_id() {
        let edit = Edit::new(
            CollectionKind::Videos,
            Operation::Create,
            "v2",
            json!({"title": "no id"}),
        );
        assert_eq!(edit.match_key(), "v2");
    }

    #[test]
    fn test_match_key_for_delete_uses_edit_id() {
        let edit = Edit::new(
            CollectionKind::Videos,
            Operation::Delete,
            "v3",
            json!({"id": "other"}),
        );
        assert_eq!(edit.match_key(), "v3");

        let edit = Edit::new(
            CollectionKind::Videos,
            Operation::Delete,
            "",
            json!({"id": "v4"}),
        );
        assert_eq!(edit.match_key(), "v4");
    }

    #[test]
    fn test_group_by_collection_preserves_order() {
        let edits = vec![
            Edit::create(CollectionKind::Videos, json!({"id": "a"})),
            Edit::update(CollectionKind::Coaches, json!({"id": "c"})),
            Edit::delete(CollectionKind::Videos, "b"),
        ];

        let groups = group_by_collection(&edits);
        assert_eq!(groups.len(), 2);

        let videos = &groups[&CollectionKind::Videos];
        assert_eq!(videos[0].operation, Operation::Create);
        assert_eq!(videos[1].operation, Operation::Delete);
    }
}
