//! Content data model
//!
//! - [`CollectionKind`]: the closed catalogue of collection files
//! - [`Edit`]: one requested mutation of one record
//! - [`CollectionSnapshot`] / [`RepositoryState`]: collection contents as read
//!   for a single commit attempt

pub mod collection;
pub mod edit;
pub mod snapshot;

pub use collection::{CollectionKind, CollectionShape};
pub use edit::{document_id, group_by_collection, Document, Edit, Operation, ID_FIELD};
pub use snapshot::{CollectionSnapshot, RepositoryState, SnapshotContent, VersionToken};
