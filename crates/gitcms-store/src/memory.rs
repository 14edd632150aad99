//! In-process snapshot repository
//!
//! A content-addressed object store with a single branch, kept behind a
//! mutex. Object handles are SHA-256 digests of the framed object body, so
//! equal content always gets the same handle. Used by tests and by
//! `gitcms serve --memory`.

use crate::errors::{lock_poisoned, not_found};
use crate::repository::{
    AdvanceOutcome, BlobHandle, CommitHandle, Head, SnapshotRepository, TreeEntry, TreeHandle,
};
use async_trait::async_trait;
use gitcms_core::canonical::{content_digest, parse_content, serialize_content};
use gitcms_core::{CollectionKind, CollectionSnapshot, Result, SnapshotContent, VersionToken};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// A commit as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub handle: CommitHandle,
    pub tree: TreeHandle,
    pub parent: Option<CommitHandle>,
    pub message: String,
}

struct Objects {
    blobs: HashMap<BlobHandle, Vec<u8>>,
    trees: HashMap<TreeHandle, BTreeMap<String, BlobHandle>>,
    commits: HashMap<CommitHandle, CommitRecord>,
    branch: CommitHandle,
    sequence: u64,
}

impl Objects {
    fn with_root<P, B>(files: impl IntoIterator<Item = (P, B)>) -> Self
    where
        P: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut objects = Objects {
            blobs: HashMap::new(),
            trees: HashMap::new(),
            commits: HashMap::new(),
            branch: CommitHandle::new(""),
            sequence: 0,
        };
        let mut entries = BTreeMap::new();
        for (path, bytes) in files {
            let blob = objects.put_blob(bytes.as_ref());
            entries.insert(path.into(), blob);
        }
        let tree = objects.put_tree(entries);
        objects.branch = objects.put_commit(tree, None, "Initial content");
        objects
    }

    fn put_blob(&mut self, bytes: &[u8]) -> BlobHandle {
        let handle = BlobHandle::new(content_digest(&framed("blob", bytes)));
        self.blobs
            .entry(handle.clone())
            .or_insert_with(|| bytes.to_vec());
        handle
    }

    fn put_tree(&mut self, entries: BTreeMap<String, BlobHandle>) -> TreeHandle {
        let mut listing = Vec::new();
        for (path, blob) in &entries {
            listing.extend_from_slice(path.as_bytes());
            listing.push(0);
            listing.extend_from_slice(blob.as_str().as_bytes());
            listing.push(b'\n');
        }
        let handle = TreeHandle::new(content_digest(&framed("tree", &listing)));
        self.trees.entry(handle.clone()).or_insert(entries);
        handle
    }

    fn put_commit(
        &mut self,
        tree: TreeHandle,
        parent: Option<CommitHandle>,
        message: &str,
    ) -> CommitHandle {
        // Sequence number stands in for a timestamp.
        self.sequence += 1;
        let body = format!(
            "tree {}\nparent {}\nseq {}\n\n{}",
            tree,
            parent.as_ref().map(CommitHandle::as_str).unwrap_or(""),
            self.sequence,
            message
        );
        let handle = CommitHandle::new(content_digest(&framed("commit", body.as_bytes())));
        self.commits.insert(
            handle.clone(),
            CommitRecord {
                handle: handle.clone(),
                tree,
                parent,
                message: message.to_string(),
            },
        );
        handle
    }

    fn head(&self) -> Option<Head> {
        let commit = self.commits.get(&self.branch)?;
        Some(Head {
            commit: commit.handle.clone(),
            tree: commit.tree.clone(),
        })
    }

    fn file_at(&self, tree: &TreeHandle, path: &str) -> Option<(&BlobHandle, &[u8])> {
        let blob = self.trees.get(tree)?.get(path)?;
        let bytes = self.blobs.get(blob)?;
        Some((blob, bytes.as_slice()))
    }
}

fn framed(kind: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!("{} {}\0", kind, body.len()).into_bytes();
    out.extend_from_slice(body);
    out
}

/// Single-branch in-memory repository
pub struct MemoryRepository {
    objects: Mutex<Objects>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Repository whose only commit has an empty tree
    pub fn new() -> Self {
        Self::seeded(Vec::<(String, Vec<u8>)>::new())
    }

    /// Repository whose initial commit holds `files` (path, bytes)
    pub fn seeded<P, B>(files: impl IntoIterator<Item = (P, B)>) -> Self
    where
        P: Into<String>,
        B: AsRef<[u8]>,
    {
        Self {
            objects: Mutex::new(Objects::with_root(files)),
        }
    }

    /// Repository seeded with serialized collection files
    ///
    /// # Errors
    ///
    /// `Serialization` if any content fails to encode.
    pub fn with_collections(
        collections: impl IntoIterator<Item = (CollectionKind, SnapshotContent)>,
    ) -> Result<Self> {
        let mut files = Vec::new();
        for (kind, content) in collections {
            files.push((kind.path().to_string(), serialize_content(&content)?));
        }
        Ok(Self::seeded(files))
    }

    /// Commit `bytes` at `path` on top of the branch, as another writer would
    ///
    /// # Errors
    ///
    /// `Internal` if the repository lock is poisoned.
    pub fn write_external(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
    ) -> Result<CommitHandle> {
        let mut objects = self.lock("write_external")?;
        let parent = objects.branch.clone();
        let base_tree = objects
            .commits
            .get(&parent)
            .map(|c| c.tree.clone())
            .ok_or_else(|| not_found("write_external", parent.as_str()))?;

        let mut entries = objects.trees.get(&base_tree).cloned().unwrap_or_default();
        let blob = objects.put_blob(bytes);
        entries.insert(path.to_string(), blob);
        let tree = objects.put_tree(entries);
        let commit = objects.put_commit(tree, Some(parent), message);
        objects.branch = commit.clone();

        tracing::debug!(path = path, commit = %commit, "External write");
        Ok(commit)
    }

    /// File contents at the branch head, `None` if absent
    ///
    /// # Errors
    ///
    /// `Internal` if the repository lock is poisoned.
    pub fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.lock("read_file")?;
        let Some(head) = objects.head() else {
            return Ok(None);
        };
        Ok(objects
            .file_at(&head.tree, path)
            .map(|(_, bytes)| bytes.to_vec()))
    }

    /// Parsed collection at the branch head
    ///
    /// # Errors
    ///
    /// `NotFound` if the collection file is absent, `Serialization` if it
    /// does not parse.
    pub fn read_collection(&self, kind: CollectionKind) -> Result<SnapshotContent> {
        let bytes = self
            .read_file(kind.path())?
            .ok_or_else(|| not_found("read_collection", kind.path()))?;
        parse_content(kind, &bytes)
    }

    /// Commit the branch points at
    ///
    /// # Errors
    ///
    /// `Internal` if the repository lock is poisoned.
    pub fn head_commit(&self) -> Result<CommitHandle> {
        Ok(self.lock("head_commit")?.branch.clone())
    }

    /// Commits reachable from the branch, newest first
    ///
    /// # Errors
    ///
    /// `Internal` if the repository lock is poisoned.
    pub fn commit_log(&self) -> Result<Vec<CommitRecord>> {
        let objects = self.lock("commit_log")?;
        let mut log = Vec::new();
        let mut cursor = Some(objects.branch.clone());
        while let Some(handle) = cursor {
            let Some(record) = objects.commits.get(&handle) else {
                break;
            };
            log.push(record.clone());
            cursor = record.parent.clone();
        }
        Ok(log)
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, Objects>> {
        self.objects.lock().map_err(|_| lock_poisoned(op))
    }
}

#[async_trait]
impl SnapshotRepository for MemoryRepository {
    async fn head(&self) -> Result<Head> {
        let objects = self.lock("head")?;
        objects
            .head()
            .ok_or_else(|| not_found("head", objects.branch.as_str()))
    }

    async fn fetch_snapshot(
        &self,
        collection: CollectionKind,
        at: &Head,
    ) -> Result<CollectionSnapshot> {
        let (blob, bytes) = {
            let objects = self.lock("fetch_snapshot")?;
            let (blob, bytes) = objects
                .file_at(&at.tree, collection.path())
                .ok_or_else(|| not_found("fetch_snapshot", collection.path()))?;
            (blob.clone(), bytes.to_vec())
        };

        let content = parse_content(collection, &bytes)?;
        Ok(CollectionSnapshot::new(
            collection,
            VersionToken::new(blob.as_str()),
            content,
        ))
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<BlobHandle> {
        Ok(self.lock("create_blob")?.put_blob(bytes))
    }

    async fn create_tree(&self, base: &TreeHandle, entries: &[TreeEntry]) -> Result<TreeHandle> {
        let mut objects = self.lock("create_tree")?;
        let mut listing = objects
            .trees
            .get(base)
            .cloned()
            .ok_or_else(|| not_found("create_tree", base.as_str()))?;

        for entry in entries {
            if !objects.blobs.contains_key(&entry.blob) {
                return Err(not_found("create_tree", entry.blob.as_str()));
            }
            listing.insert(entry.path.clone(), entry.blob.clone());
        }
        Ok(objects.put_tree(listing))
    }

    async fn create_commit(
        &self,
        tree: &TreeHandle,
        parent: &CommitHandle,
        message: &str,
    ) -> Result<CommitHandle> {
        let mut objects = self.lock("create_commit")?;
        if !objects.trees.contains_key(tree) {
            return Err(not_found("create_commit", tree.as_str()));
        }
        if !objects.commits.contains_key(parent) {
            return Err(not_found("create_commit", parent.as_str()));
        }
        Ok(objects.put_commit(tree.clone(), Some(parent.clone()), message))
    }

    async fn advance_branch(
        &self,
        expected: &CommitHandle,
        new: &CommitHandle,
    ) -> Result<AdvanceOutcome> {
        let mut objects = self.lock("advance_branch")?;
        if !objects.commits.contains_key(new) {
            return Err(not_found("advance_branch", new.as_str()));
        }
        if objects.branch != *expected {
            tracing::debug!(expected = %expected, actual = %objects.branch, "Branch moved");
            return Ok(AdvanceOutcome::Conflict);
        }
        objects.branch = new.clone();
        Ok(AdvanceOutcome::Advanced)
    }
}
