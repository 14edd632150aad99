//! Collection snapshots and per-attempt repository state

use crate::model::{document_id, CollectionKind, CollectionShape, Document};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Opaque version marker supplied by the snapshot store (a blob sha for git
/// backends). Informational only; the branch pointer is the real gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parsed content of one collection file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapshotContent {
    Array(Vec<Document>),
    Singleton(Document),
}

impl SnapshotContent {
    /// Empty content of the right shape for `kind`
    pub fn empty_for(kind: CollectionKind) -> Self {
        match kind.shape() {
            CollectionShape::Array => SnapshotContent::Array(Vec::new()),
            CollectionShape::Singleton => {
                SnapshotContent::Singleton(Document::Object(Default::default()))
            }
        }
    }

    pub fn shape(&self) -> CollectionShape {
        match self {
            SnapshotContent::Array(_) => CollectionShape::Array,
            SnapshotContent::Singleton(_) => CollectionShape::Singleton,
        }
    }

    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            SnapshotContent::Array(items) => Some(items),
            SnapshotContent::Singleton(_) => None,
        }
    }

    /// Record identifiers of an array collection (empty for singletons)
    pub fn ids(&self) -> BTreeSet<String> {
        self.as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(document_id)
            .map(str::to_string)
            .collect()
    }

    /// Find a record by identifier
    pub fn find(&self, id: &str) -> Option<&Document> {
        self.as_array()?
            .iter()
            .find(|doc| document_id(doc) == Some(id))
    }
}

/// One collection as read at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: CollectionKind,
    pub path: String,
    pub version_token: VersionToken,
    pub content: SnapshotContent,
}

impl CollectionSnapshot {
    pub fn new(
        collection: CollectionKind,
        version_token: VersionToken,
        content: SnapshotContent,
    ) -> Self {
        Self {
            collection,
            path: collection.path().to_string(),
            version_token,
            content,
        }
    }
}

/// The collections one commit attempt touches
///
/// Snapshots sit behind `Arc`, so a state derived from another shares every
/// collection it did not change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryState {
    snapshots: BTreeMap<CollectionKind, Arc<CollectionSnapshot>>,
}

impl RepositoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: CollectionSnapshot) {
        self.snapshots
            .insert(snapshot.collection, Arc::new(snapshot));
    }

    pub fn with_snapshot(mut self, snapshot: CollectionSnapshot) -> Self {
        self.insert(snapshot);
        self
    }

    pub fn get(&self, kind: CollectionKind) -> Option<&CollectionSnapshot> {
        self.snapshots.get(&kind).map(Arc::as_ref)
    }

    pub fn contains(&self, kind: CollectionKind) -> bool {
        self.snapshots.contains_key(&kind)
    }

    /// Mutable access that clones the snapshot only if it is still shared
    pub fn get_mut(&mut self, kind: CollectionKind) -> Option<&mut CollectionSnapshot> {
        self.snapshots.get_mut(&kind).map(Arc::make_mut)
    }

    /// Whether `self` and `other` hold the very same snapshot allocation
    pub fn shares(&self, other: &RepositoryState, kind: CollectionKind) -> bool {
        match (self.snapshots.get(&kind), other.snapshots.get(&kind)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn collections(&self) -> impl Iterator<Item = CollectionKind> + '_ {
        self.snapshots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionSnapshot> {
        self.snapshots.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Collections whose content differs from `base`
    pub fn changed_since(&self, base: &RepositoryState) -> Vec<CollectionKind> {
        let mut changed = Vec::new();
        for (kind, snapshot) in &self.snapshots {
            let differs = match base.snapshots.get(kind) {
                Some(before) => {
                    !Arc::ptr_eq(before, snapshot) && before.content != snapshot.content
                }
                None => true,
            };
            if differs {
                changed.push(*kind);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn videos(items: Vec<Document>) -> CollectionSnapshot {
        CollectionSnapshot::new(
            CollectionKind::Videos,
            VersionToken::new("sha-videos"),
            SnapshotContent::Array(items),
        )
    }

    #[test]
    fn test_snapshot_path_follows_collection() {
        let snapshot = videos(vec![]);
        assert_eq!(snapshot.path, "data/videos.json");
    }

    #[test]
    fn test_ids_and_find() {
        let content = SnapshotContent::Array(vec![json!({"id": "a"}), json!({"id": "b"})]);
        assert_eq!(content.ids().len(), 2);
        assert!(content.find("b").is_some());
        assert!(content.find("z").is_none());
    }

    #[test]
    fn test_get_mut_copies_on_write() {
        let base = RepositoryState::new().with_snapshot(videos(vec![json!({"id": "a"})]));
        let mut derived = base.clone();
        assert!(derived.shares(&base, CollectionKind::Videos));

        if let Some(snapshot) = derived.get_mut(CollectionKind::Videos) {
            snapshot.content = SnapshotContent::Array(vec![]);
        }

        assert!(!derived.shares(&base, CollectionKind::Videos));
        assert_eq!(base.get(CollectionKind::Videos).unwrap().content.ids().len(), 1);
        assert_eq!(derived.changed_since(&base), vec![CollectionKind::Videos]);
    }

    #[test]
    fn test_changed_since_ignores_equal_content() {
        let base = RepositoryState::new().with_snapshot(videos(vec![json!({"id": "a"})]));
        let mut derived = base.clone();
        if let Some(snapshot) = derived.get_mut(CollectionKind::Videos) {
            snapshot.content = SnapshotContent::Array(vec![json!({"id": "a"})]);
        }
        assert!(derived.changed_since(&base).is_empty());
    }

    #[test]
    fn test_empty_for_matches_shape() {
        assert_eq!(
            SnapshotContent::empty_for(CollectionKind::About).shape(),
            CollectionShape::Singleton
        );
        assert_eq!(
            SnapshotContent::empty_for(CollectionKind::Events).shape(),
            CollectionShape::Array
        );
    }
}
