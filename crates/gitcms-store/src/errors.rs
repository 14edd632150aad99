//! Error handling for gitcms-store
//!
//! Transport-level failures are a `thiserror` enum; they are folded into the
//! canonical `CmsError` at the trait boundary.

use gitcms_core::errors::{CmsError, ErrorKind};
use thiserror::Error;

/// Failure talking to a remote snapshot store
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Transport(_) | RemoteError::Status { .. } => ErrorKind::RemoteUnavailable,
            RemoteError::NotFound(_) => ErrorKind::NotFound,
            RemoteError::Decode(_) => ErrorKind::Serialization,
        }
    }

    /// Convert into the canonical error, tagging the failing operation
    pub fn into_cms(self, op: &str) -> CmsError {
        CmsError::new(self.kind())
            .with_op(op.to_string())
            .with_message(self.to_string())
    }
}

/// Create a NotFound error for a path or object
pub fn not_found(op: &str, what: &str) -> CmsError {
    RemoteError::NotFound(what.to_string()).into_cms(op)
}

/// Create an Internal error for a poisoned lock
pub fn lock_poisoned(op: &str) -> CmsError {
    CmsError::new(ErrorKind::Internal)
        .with_op(op.to_string())
        .with_message("repository lock poisoned")
}
