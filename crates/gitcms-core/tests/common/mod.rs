use gitcms_core::{
    CollectionKind, CollectionSnapshot, Document, RepositoryState, SnapshotContent, VersionToken,
};

/// State holding one array collection
#[allow(dead_code)]
pub fn array_state(kind: CollectionKind, items: Vec<Document>) -> RepositoryState {
    RepositoryState::new().with_snapshot(CollectionSnapshot::new(
        kind,
        VersionToken::new(format!("{}-0", kind)),
        SnapshotContent::Array(items),
    ))
}

/// State holding one singleton collection
#[allow(dead_code)]
pub fn singleton_state(kind: CollectionKind, doc: Document) -> RepositoryState {
    RepositoryState::new().with_snapshot(CollectionSnapshot::new(
        kind,
        VersionToken::new(format!("{}-0", kind)),
        SnapshotContent::Singleton(doc),
    ))
}

/// Array content of `kind`, or an empty vec
#[allow(dead_code)]
pub fn items(state: &RepositoryState, kind: CollectionKind) -> Vec<Document> {
    state
        .get(kind)
        .and_then(|s| s.content.as_array())
        .map(|a| a.to_vec())
        .unwrap_or_default()
}
