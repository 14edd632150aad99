//! JSON bodies of the batch commit endpoint

use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::model::{document_id, Document};
use gitcms_core::{CollectionKind, Edit, Operation};
use serde::{Deserialize, Serialize};

/// Inbound batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitRequest {
    #[serde(default)]
    pub edits: Vec<EditRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One edit as submitted, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub collection: String,
    pub operation: String,
    #[serde(default)]
    pub data: Document,
}

impl EditRequest {
    /// Validate into a domain edit
    ///
    /// Singleton edits default their id to the collection tag; array edits
    /// need an id either on the edit or in `data.id`.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for an unknown operation tag
    /// - `ValidationFailed` for an unknown collection, a missing id, or
    ///   create/update data that is not a JSON object
    pub fn into_edit(self, index: usize) -> Result<Edit> {
        let context = |err: CmsError| {
            let err = err.with_op("validate_edit");
            match &self.id {
                Some(id) => err.with_entity_id(id.clone()),
                None => err,
            }
        };

        let operation = Operation::parse(&self.operation).map_err(|e| {
            context(e).with_message(format!(
                "Edit {} has unknown operation '{}'",
                index, self.operation
            ))
        })?;
        let collection: CollectionKind = self.collection.parse().map_err(|e| {
            context(e)
                .with_operation(operation)
                .with_message(format!(
                    "Edit {} targets unknown collection '{}'",
                    index, self.collection
                ))
        })?;

        let invalid = |message: String| {
            context(CmsError::new(ErrorKind::ValidationFailed))
                .with_collection(collection)
                .with_operation(operation)
                .with_message(message)
        };

        if operation != Operation::Delete && !self.data.is_object() {
            return Err(invalid(format!("Edit {} data must be a JSON object", index)));
        }

        let id = match (self.id.as_deref(), document_id(&self.data)) {
            (Some(id), _) if !id.is_empty() => id.to_string(),
            (_, Some(id)) if !id.is_empty() => id.to_string(),
            _ if collection.is_singleton() => collection.tag().to_string(),
            _ => return Err(invalid(format!("Edit {} has no id", index))),
        };

        Ok(Edit::new(collection, operation, id, self.data))
    }
}

/// Successful batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub success: bool,
    pub commit: String,
    pub attempts: u32,
    pub message: String,
}

/// Failed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable error code, e.g. `ERR_COMMIT_CONFLICT_EXHAUSTED`
    pub error: String,
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl From<&CmsError> for ErrorResponse {
    fn from(err: &CmsError) -> Self {
        Self {
            success: false,
            error: err.code().to_string(),
            message: err.to_string(),
            status: err.http_status(),
            request_id: err.request_id().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> EditRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_id_falls_back_to_data() {
        let edit = request(json!({
            "collection": "videos",
            "operation": "create",
            "data": {"id": "v1", "title": "T"}
        }))
        .into_edit(0)
        .unwrap();
        assert_eq!(edit.id, "v1");
        assert_eq!(edit.collection, CollectionKind::Videos);
    }

    #[test]
    fn test_unknown_operation() {
        let err = request(json!({
            "id": "v1",
            "collection": "videos",
            "operation": "upsert",
            "data": {}
        }))
        .into_edit(3)
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(err.entity_id(), Some("v1"));
        assert!(err.message().contains("upsert"));
    }

    #[test]
    fn test_unknown_collection() {
        let err = request(json!({
            "id": "x",
            "collection": "tournaments",
            "operation": "create",
            "data": {}
        }))
        .into_edit(0)
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.operation(), Some(Operation::Create));
    }

    #[test]
    fn test_missing_id_on_array_collection() {
        let err = request(json!({
            "collection": "events",
            "operation": "update",
            "data": {"title": "Cup"}
        }))
        .into_edit(0)
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.collection(), Some(CollectionKind::Events));
    }

    #[test]
    fn test_singleton_id_defaults_to_tag() {
        let edit = request(json!({
            "collection": "about",
            "operation": "update",
            "data": {"headline": "Hi"}
        }))
        .into_edit(0)
        .unwrap();
        assert_eq!(edit.id, "about");
    }

    #[test]
    fn test_delete_needs_no_data() {
        let edit = request(json!({
            "id": "v1",
            "collection": "videos",
            "operation": "delete"
        }))
        .into_edit(0)
        .unwrap();
        assert_eq!(edit.operation, Operation::Delete);
        assert_eq!(edit.match_key(), "v1");
    }

    #[test]
    fn test_error_response_from_error() {
        let err = CmsError::new(ErrorKind::CommitConflictExhausted).with_attempts(3);
        let body = ErrorResponse::from(&err);
        assert!(!body.success);
        assert_eq!(body.error, "ERR_COMMIT_CONFLICT_EXHAUSTED");
        assert_eq!(body.status, 409);
    }
}
