//! Change application engine
//!
//! Folds an ordered batch of edits into the snapshots of the collections it
//! targets. No I/O: the orchestrator calls this once per commit attempt on
//! freshly fetched snapshots.
//!
//! ## Semantics
//!
//! Array collections match records by `id`:
//! - **create**: append if absent, otherwise no-op (replaying a create never
//!   duplicates)
//! - **update**: replace in place if present, otherwise insert (upsert)
//! - **delete**: remove if present, otherwise no-op
//!
//! Singleton collections only honour **update**, which replaces the whole
//! document; create and delete are ignored because a singleton always exists.
//!
//! An update never rewrites a record's identifier.
//!
//! ## Example
//!
//! ```
//! use gitcms_core::{apply_changes, group_by_collection, CollectionKind, CollectionSnapshot,
//!     Edit, RepositoryState, SnapshotContent, VersionToken};
//! use serde_json::json;
//!
//! let state = RepositoryState::new().with_snapshot(CollectionSnapshot::new(
//!     CollectionKind::Videos,
//!     VersionToken::new("blob-1"),
//!     SnapshotContent::Array(vec![json!({"id": "v1"})]),
//! ));
//! let edits = vec![Edit::create(CollectionKind::Videos, json!({"id": "v2"}))];
//!
//! let next = apply_changes(state, &group_by_collection(&edits)).unwrap();
//! assert_eq!(next.get(CollectionKind::Videos).unwrap().content.ids().len(), 2);
//! ```

use crate::errors::{CmsError, ErrorKind, Result};
use crate::model::{
    document_id, CollectionKind, Document, Edit, Operation, RepositoryState, SnapshotContent,
    ID_FIELD,
};
use std::collections::BTreeMap;

/// Apply grouped edits to `state`, returning the new state
///
/// Collections absent from `edits_by_collection` are passed through
/// untouched and stay shared with the input.
///
/// # Errors
///
/// `Internal` if a collection named in `edits_by_collection` has no snapshot
/// in `state`, or if a snapshot's content shape does not match its
/// collection. Both are caller bugs: the orchestrator always fetches every
/// touched collection before applying.
pub fn apply_changes(
    mut state: RepositoryState,
    edits_by_collection: &BTreeMap<CollectionKind, Vec<Edit>>,
) -> Result<RepositoryState> {
    for (&kind, edits) in edits_by_collection {
        if edits.is_empty() {
            continue;
        }

        let snapshot = state.get_mut(kind).ok_or_else(|| {
            CmsError::new(ErrorKind::Internal)
                .with_op("apply_changes")
                .with_collection(kind)
                .with_message("No snapshot loaded for collection")
        })?;

        if snapshot.content.shape() != kind.shape() {
            return Err(CmsError::new(ErrorKind::Internal)
                .with_op("apply_changes")
                .with_collection(kind)
                .with_message("Snapshot content shape does not match collection"));
        }

        for edit in edits {
            debug_assert_eq!(edit.collection, kind);
            apply_edit(&mut snapshot.content, edit);
        }
    }

    Ok(state)
}

/// Apply one edit to one collection's content
pub fn apply_edit(content: &mut SnapshotContent, edit: &Edit) {
    match content {
        SnapshotContent::Singleton(doc) => apply_to_singleton(doc, edit),
        SnapshotContent::Array(items) => apply_to_array(items, edit),
    }
}

fn apply_to_singleton(doc: &mut Document, edit: &Edit) {
    match edit.operation {
        Operation::Update => *doc = edit.data.clone(),
        Operation::Create | Operation::Delete => {
            tracing::debug!(
                collection = %edit.collection,
                operation = %edit.operation,
                "Ignoring non-update edit on singleton collection"
            );
        }
    }
}

fn apply_to_array(items: &mut Vec<Document>, edit: &Edit) {
    let key = edit.match_key();
    let position = items.iter().position(|doc| document_id(doc) == Some(key));

    match (edit.operation, position) {
        (Operation::Create, Some(_)) => {
            tracing::debug!(collection = %edit.collection, id = key, "Create of existing record is a no-op");
        }
        (Operation::Create, None) | (Operation::Update, None) => {
            items.push(with_id(edit.data.clone(), key));
        }
        (Operation::Update, Some(index)) => {
            // Pre-image id wins over anything carried in data.
            let original_id = document_id(&items[index]).unwrap_or(key).to_string();
            items[index] = with_id(edit.data.clone(), &original_id);
        }
        (Operation::Delete, Some(_)) => {
            items.retain(|doc| document_id(doc) != Some(key));
        }
        (Operation::Delete, None) => {
            tracing::debug!(collection = %edit.collection, id = key, "Delete of missing record is a no-op");
        }
    }
}

/// Force `doc.id` to `id` (object documents only)
fn with_id(mut doc: Document, id: &str) -> Document {
    if let Document::Object(map) = &mut doc {
        map.insert(ID_FIELD.to_string(), Document::String(id.to_string()));
    }
    doc
}
