use crate::model::{CollectionKind, Operation};
use gitcms_core_types::RequestId;

/// Result type alias using CmsError
pub type Result<T> = std::result::Result<T, CmsError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used in API responses, in log
/// lines (`err_code`) and in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Batch construction
    /// An edit carries an operation tag that is not create/update/delete
    InvalidOperation,
    /// The batch is empty or an edit is malformed
    ValidationFailed,
    /// The caller may not modify the targeted collection
    AuthorizationDenied,

    // Snapshot store
    RemoteUnavailable,
    NotFound,

    // Commit
    /// Every attempt lost the branch compare-and-swap race
    CommitConflictExhausted,
    /// Building blobs, trees or the commit failed
    CommitFailed,

    // Ambient
    Serialization,
    Config,
    Internal,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidOperation => "ERR_INVALID_OPERATION",
            ErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ErrorKind::AuthorizationDenied => "ERR_AUTHORIZATION_DENIED",
            ErrorKind::RemoteUnavailable => "ERR_REMOTE_UNAVAILABLE",
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::CommitConflictExhausted => "ERR_COMMIT_CONFLICT_EXHAUSTED",
            ErrorKind::CommitFailed => "ERR_COMMIT_FAILED",
            ErrorKind::Serialization => "ERR_SERIALIZATION",
            ErrorKind::Config => "ERR_CONFIG",
            ErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// HTTP status an API surface should answer with for this kind
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidOperation | ErrorKind::ValidationFailed => 400,
            ErrorKind::AuthorizationDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::CommitConflictExhausted => 409,
            ErrorKind::RemoteUnavailable | ErrorKind::CommitFailed => 502,
            ErrorKind::Serialization | ErrorKind::Config | ErrorKind::Internal => 500,
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus enough context (collection, operation,
/// record identifier, attempt count) for a user to retry a failed save by
/// hand.
#[derive(Debug, Clone)]
pub struct CmsError {
    kind: ErrorKind,
    op: Option<String>,
    collection: Option<CollectionKind>,
    operation: Option<Operation>,
    entity_id: Option<String>,
    attempts: Option<u32>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<CmsError>>,
}

impl CmsError {
    /// Create a new error with the specified kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            op: None,
            collection: None,
            operation: None,
            entity_id: None,
            attempts: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the collection the failing edit targeted
    pub fn with_collection(mut self, collection: CollectionKind) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Add the edit operation (create/update/delete)
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Add the record identifier
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add the number of commit attempts made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: CmsError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn collection(&self) -> Option<CollectionKind> {
        self.collection
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the underlying cause, if any
    pub fn source_error(&self) -> Option<&CmsError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for CmsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(collection) = self.collection {
            write!(f, " (collection: {})", collection)?;
        }
        if let Some(operation) = self.operation {
            write!(f, " (operation: {})", operation)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (id: {})", entity_id)?;
        }
        if let Some(attempts) = self.attempts {
            write!(f, " (attempts: {})", attempts)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CmsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for CmsError {
    fn from(err: serde_json::Error) -> Self {
        CmsError::new(ErrorKind::Serialization).with_message(err.to_string())
    }
}

// ========== End Error Facility ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let kinds = [
            ErrorKind::InvalidOperation,
            ErrorKind::ValidationFailed,
            ErrorKind::AuthorizationDenied,
            ErrorKind::RemoteUnavailable,
            ErrorKind::NotFound,
            ErrorKind::CommitConflictExhausted,
            ErrorKind::CommitFailed,
            ErrorKind::Serialization,
            ErrorKind::Config,
            ErrorKind::Internal,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_display_includes_retry_context() {
        let err = CmsError::new(ErrorKind::CommitFailed)
            .with_op("create_blob")
            .with_collection(CollectionKind::Videos)
            .with_operation(Operation::Update)
            .with_entity_id("v1")
            .with_message("remote rejected blob");

        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_COMMIT_FAILED]"));
        assert!(rendered.contains("collection: videos"));
        assert!(rendered.contains("operation: update"));
        assert!(rendered.contains("id: v1"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        let cause = CmsError::new(ErrorKind::RemoteUnavailable).with_message("HTTP 503");
        let err = CmsError::new(ErrorKind::CommitFailed).with_source(cause);

        assert_eq!(
            err.source_error().map(|e| e.kind()),
            Some(ErrorKind::RemoteUnavailable)
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorKind::ValidationFailed.http_status(), 400);
        assert_eq!(ErrorKind::InvalidOperation.http_status(), 400);
        assert_eq!(ErrorKind::AuthorizationDenied.http_status(), 403);
        assert_eq!(ErrorKind::CommitConflictExhausted.http_status(), 409);
        assert_eq!(ErrorKind::CommitFailed.http_status(), 502);
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CmsError = parse_err.into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
