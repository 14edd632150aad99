//! gitcms Core - pure content kernel
//!
//! This crate holds everything about a content batch that does not touch the
//! network:
//! - Collection catalogue, edits and collection snapshots
//! - The change application engine (`apply_changes`)
//! - The reference integrity cleaner (`prune_dangling_references`)
//! - Deterministic JSON serialization of collection files
//! - The error and logging facilities shared by the other crates

pub mod apply;
pub mod canonical;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod prune;

pub use gitcms_core_types as types;

// Re-export commonly used types
pub use apply::apply_changes;
pub use errors::{CmsError, ErrorKind, Result};
pub use model::{
    group_by_collection, CollectionKind, CollectionShape, CollectionSnapshot, Document, Edit,
    Operation, RepositoryState, SnapshotContent, VersionToken,
};
pub use prune::prune_dangling_references;
