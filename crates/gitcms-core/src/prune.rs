//! Reference integrity cleaner
//!
//! Build orders, replays and masterclasses point at media records through a
//! `videoIds` list. Once a media record has been deleted by an explicit
//! delete edit, this module drops the now-dangling identifiers from those
//! lists. It never deletes a referencing record, even when its list ends up
//! empty, and it never touches the media collection itself.

use crate::model::{document_id, CollectionKind, Document, RepositoryState, SnapshotContent};
use std::collections::BTreeSet;

/// A reference that points at a media record not in the valid set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub collection: CollectionKind,
    pub record_id: Option<String>,
    pub target_id: String,
}

/// Filter every `videoIds` list in `state` down to `valid_ids`
///
/// Only collections that reference media are inspected; a collection is
/// rewritten (and stops sharing its snapshot with the input) only if at
/// least one of its records actually held a dangling reference. Running it
/// twice with the same `valid_ids` changes nothing the second time.
pub fn prune_dangling_references(
    mut state: RepositoryState,
    valid_ids: &BTreeSet<String>,
) -> RepositoryState {
    let referrers: Vec<CollectionKind> = state
        .collections()
        .filter(|kind| kind.references_media())
        .collect();

    for kind in referrers {
        let needs_pruning = state
            .get(kind)
            .and_then(|s| s.content.as_array())
            .is_some_and(|records| records.iter().any(|r| has_dangling(r, valid_ids)));
        if !needs_pruning {
            continue;
        }

        if let Some(snapshot) = state.get_mut(kind) {
            if let SnapshotContent::Array(records) = &mut snapshot.content {
                for record in records.iter_mut() {
                    prune_record(record, valid_ids);
                }
            }
        }
    }

    state
}

/// List dangling references without modifying anything
pub fn find_dangling_references(
    state: &RepositoryState,
    valid_ids: &BTreeSet<String>,
) -> Vec<DanglingReference> {
    let mut found = Vec::new();
    for snapshot in state.iter().filter(|s| s.collection.references_media()) {
        let Some(records) = snapshot.content.as_array() else {
            continue;
        };
        for record in records {
            for target in reference_list(record).into_iter().flatten() {
                let live = target.as_str().is_some_and(|id| valid_ids.contains(id));
                if !live {
                    found.push(DanglingReference {
                        collection: snapshot.collection,
                        record_id: document_id(record).map(str::to_string),
                        target_id: target
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| target.to_string()),
                    });
                }
            }
        }
    }
    found
}

fn reference_list(record: &Document) -> Option<&Vec<Document>> {
    record
        .get(CollectionKind::REFERENCE_FIELD)
        .and_then(|v| v.as_array())
}

fn has_dangling(record: &Document, valid_ids: &BTreeSet<String>) -> bool {
    reference_list(record).is_some_and(|ids| {
        ids.iter()
            .any(|id| !id.as_str().is_some_and(|id| valid_ids.contains(id)))
    })
}

fn prune_record(record: &mut Document, valid_ids: &BTreeSet<String>) {
    if let Some(Document::Array(ids)) = record.get_mut(CollectionKind::REFERENCE_FIELD) {
        ids.retain(|id| id.as_str().is_some_and(|id| valid_ids.contains(id)));
    }
}
