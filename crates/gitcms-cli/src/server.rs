//! HTTP surface
//!
//! - `GET /health`
//! - `POST /api/content/commit`: bearer token -> principal, body is a
//!   `CommitRequest`, answers `CommitResponse` or `ErrorResponse`

use crate::app::DynBatchHandler;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gitcms_core::errors::{CmsError, ErrorKind};
use gitcms_core::types::{RequestContext, RequestId, TraceId};
use gitcms_engine::{CommitRequest, ErrorResponse, Principal, ServerConfig};
use serde::Serialize;
use std::sync::Arc;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Code sent with 401 answers; authentication happens before the engine
pub const ERR_UNAUTHENTICATED: &str = "ERR_UNAUTHENTICATED";

#[derive(Clone)]
pub struct AppState {
    handler: Arc<DynBatchHandler>,
    server: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(handler: Arc<DynBatchHandler>, server: Arc<ServerConfig>) -> Self {
        Self { handler, server }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/content/commit", post(commit_batch))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn commit_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CommitRequest>, JsonRejection>,
) -> Response {
    let Some(principal) = authenticate(&headers, &state.server) else {
        return unauthenticated();
    };

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = CmsError::new(ErrorKind::ValidationFailed)
                .with_op("parse_request")
                .with_message(rejection.body_text());
            return error_response(&err);
        }
    };

    match state
        .handler
        .handle_in(request_context(&headers), &principal, request)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn authenticate(headers: &HeaderMap, server: &ServerConfig) -> Option<Principal> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    server.principal_for(token).cloned()
}

/// Adopt caller-supplied correlation ids, minting a request id otherwise
fn request_context(headers: &HeaderMap) -> RequestContext {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let mut ctx = match header_value(REQUEST_ID_HEADER) {
        Some(id) => RequestContext::with_request_id(RequestId::from_string(id)),
        None => RequestContext::new(),
    };
    if let Some(trace) = header_value(TRACE_ID_HEADER) {
        ctx = ctx.with_trace_id(TraceId::from_string(trace));
    }
    ctx
}

fn unauthenticated() -> Response {
    let body = ErrorResponse {
        success: false,
        error: ERR_UNAUTHENTICATED.to_string(),
        message: "Missing or unknown bearer token".to_string(),
        status: StatusCode::UNAUTHORIZED.as_u16(),
        request_id: None,
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn error_response(err: &CmsError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}
