//! Canonical schema constants for structured logging and events
//!
//! These constants keep log field names identical across the orchestrator,
//! the request handler and the repository adapters.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Commit identifiers
pub const FIELD_COLLECTION: &str = "collection";
pub const FIELD_ATTEMPT: &str = "attempt";
pub const FIELD_HEAD: &str = "head";
pub const FIELD_COMMIT: &str = "commit";

// Batch sizes
pub const FIELD_EDIT_COUNT: &str = "edit_count";
pub const FIELD_COLLECTION_COUNT: &str = "collection_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
