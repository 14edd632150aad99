//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use gitcms_core::canonical::serialize_content;
use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::{CollectionKind, CollectionSnapshot, SnapshotContent};
use gitcms_engine::CommitConfig;
use gitcms_store::{
    AdvanceOutcome, BlobHandle, CommitHandle, Head, MemoryRepository, SnapshotRepository,
    TreeEntry, TreeHandle,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Retry policy without sleeping
pub fn fast_config(max_attempts: u32) -> CommitConfig {
    CommitConfig::default()
        .with_max_attempts(max_attempts)
        .with_retry_backoff(Duration::ZERO)
}

pub fn array(items: Vec<Value>) -> SnapshotContent {
    SnapshotContent::Array(items)
}

pub fn bytes_of(content: &SnapshotContent) -> Vec<u8> {
    serialize_content(content).unwrap()
}

/// Memory repository wrapped with call counters and scripted faults
pub struct ScriptedRepository {
    pub inner: MemoryRepository,
    /// Written by "another writer" just before each advance, one per call
    external_writes: Mutex<VecDeque<(CollectionKind, SnapshotContent)>>,
    always_conflict: bool,
    fail_blobs: bool,
    pub heads: AtomicU32,
    pub fetches: AtomicU32,
    pub blobs: AtomicU32,
    pub advances: AtomicU32,
}

impl ScriptedRepository {
    pub fn new(collections: Vec<(CollectionKind, SnapshotContent)>) -> Self {
        Self {
            inner: MemoryRepository::with_collections(collections).unwrap(),
            external_writes: Mutex::new(VecDeque::new()),
            always_conflict: false,
            fail_blobs: false,
            heads: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
            blobs: AtomicU32::new(0),
            advances: AtomicU32::new(0),
        }
    }

    /// Commit `content` externally right before the next advance
    pub fn race_next_advance(self, kind: CollectionKind, content: SnapshotContent) -> Self {
        self.external_writes
            .lock()
            .unwrap()
            .push_back((kind, content));
        self
    }

    /// Every advance loses the compare-and-swap
    pub fn always_conflicting(mut self) -> Self {
        self.always_conflict = true;
        self
    }

    /// Every blob write fails as if the remote were down
    pub fn failing_blobs(mut self) -> Self {
        self.fail_blobs = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    pub fn read(&self, kind: CollectionKind) -> SnapshotContent {
        self.inner.read_collection(kind).unwrap()
    }
}

#[async_trait]
impl SnapshotRepository for ScriptedRepository {
    async fn head(&self) -> Result<Head> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.inner.head().await
    }

    async fn fetch_snapshot(&self, collection: CollectionKind, at: &Head) -> Result<CollectionSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_snapshot(collection, at).await
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<BlobHandle> {
        self.blobs.fetch_add(1, Ordering::SeqCst);
        if self.fail_blobs {
            return Err(CmsError::new(ErrorKind::RemoteUnavailable)
                .with_op("create_blob")
                .with_message("HTTP 503: service unavailable"));
        }
        self.inner.create_blob(bytes).await
    }

    async fn create_tree(&self, base: &TreeHandle, entries: &[TreeEntry]) -> Result<TreeHandle> {
        self.inner.create_tree(base, entries).await
    }

    async fn create_commit(
        &self,
        tree: &TreeHandle,
        parent: &CommitHandle,
        message: &str,
    ) -> Result<CommitHandle> {
        self.inner.create_commit(tree, parent, message).await
    }

    async fn advance_branch(
        &self,
        expected: &CommitHandle,
        new: &CommitHandle,
    ) -> Result<AdvanceOutcome> {
        self.advances.fetch_add(1, Ordering::SeqCst);
        if self.always_conflict {
            return Ok(AdvanceOutcome::Conflict);
        }
        let external = self.external_writes.lock().unwrap().pop_front();
        if let Some((kind, content)) = external {
            self.inner
                .write_external(kind.path(), &bytes_of(&content), "External edit")?;
        }
        self.inner.advance_branch(expected, new).await
    }
}
