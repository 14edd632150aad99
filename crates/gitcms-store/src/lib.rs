//! gitcms Store - snapshot repository client
//!
//! Provides:
//! - The `SnapshotRepository` trait: read a collection file at a commit, and
//!   the low-level git primitives (blob, tree, commit, branch compare-and-swap)
//! - `GitHubRepository`: the trait over the GitHub REST git-data API
//! - `MemoryRepository`: an in-process content-addressed repository for
//!   tests and local runs
//!
//! No business logic lives here. Errors are propagated, never retried.

pub mod errors;
pub mod github;
pub mod memory;
pub mod repository;

// Re-export key types
pub use errors::RemoteError;
pub use github::{GitHubConfig, GitHubRepository};
pub use memory::MemoryRepository;
pub use repository::{
    AdvanceOutcome, BlobHandle, CommitHandle, Head, SnapshotRepository, TreeEntry, TreeHandle,
};
