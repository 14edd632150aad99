//! Snapshot repository contract
//!
//! The orchestrator only ever talks to the remote store through this trait.
//! Reads are pinned to an explicit `Head`, so every collection fetched during
//! one attempt comes from the same commit. Writes are the git object
//! primitives plus a compare-and-swap on the branch pointer.

use async_trait::async_trait;
use gitcms_core::{CollectionKind, CollectionSnapshot, Result};
use std::sync::Arc;

macro_rules! object_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(sha: impl Into<String>) -> Self {
                Self(sha.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

object_handle!(
    /// Content address of a stored file body
    BlobHandle
);
object_handle!(
    /// Content address of a directory listing
    TreeHandle
);
object_handle!(
    /// Content address of a commit
    CommitHandle
);

/// Where the branch pointed when it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub commit: CommitHandle,
    pub tree: TreeHandle,
}

/// One file to place in a new tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: BlobHandle,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, blob: BlobHandle) -> Self {
        Self {
            path: path.into(),
            blob,
        }
    }
}

/// Result of a branch compare-and-swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The branch now points at the new commit
    Advanced,
    /// The branch no longer pointed at the expected commit; nothing changed
    Conflict,
}

/// Remote content store with git-like semantics
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Read the current branch head
    async fn head(&self) -> Result<Head>;

    /// Read and parse one collection file as of `at`
    ///
    /// # Errors
    ///
    /// `NotFound` if the file does not exist at that commit,
    /// `RemoteUnavailable` on transport failure, `Serialization` if the file
    /// does not parse into the collection's shape.
    async fn fetch_snapshot(&self, collection: CollectionKind, at: &Head)
        -> Result<CollectionSnapshot>;

    /// Store a file body
    async fn create_blob(&self, bytes: &[u8]) -> Result<BlobHandle>;

    /// Create a tree equal to `base` with `entries` replaced or added
    async fn create_tree(&self, base: &TreeHandle, entries: &[TreeEntry]) -> Result<TreeHandle>;

    /// Create a commit of `tree` with a single parent
    async fn create_commit(
        &self,
        tree: &TreeHandle,
        parent: &CommitHandle,
        message: &str,
    ) -> Result<CommitHandle>;

    /// Move the branch from `expected` to `new`, only if it still points at
    /// `expected`
    async fn advance_branch(
        &self,
        expected: &CommitHandle,
        new: &CommitHandle,
    ) -> Result<AdvanceOutcome>;
}

#[async_trait]
impl<R: SnapshotRepository + ?Sized> SnapshotRepository for Arc<R> {
    async fn head(&self) -> Result<Head> {
        (**self).head().await
    }

    async fn fetch_snapshot(
        &self,
        collection: CollectionKind,
        at: &Head,
    ) -> Result<CollectionSnapshot> {
        (**self).fetch_snapshot(collection, at).await
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<BlobHandle> {
        (**self).create_blob(bytes).await
    }

    async fn create_tree(&self, base: &TreeHandle, entries: &[TreeEntry]) -> Result<TreeHandle> {
        (**self).create_tree(base, entries).await
    }

    async fn create_commit(
        &self,
        tree: &TreeHandle,
        parent: &CommitHandle,
        message: &str,
    ) -> Result<CommitHandle> {
        (**self).create_commit(tree, parent, message).await
    }

    async fn advance_branch(
        &self,
        expected: &CommitHandle,
        new: &CommitHandle,
    ) -> Result<AdvanceOutcome> {
        (**self).advance_branch(expected, new).await
    }
}
