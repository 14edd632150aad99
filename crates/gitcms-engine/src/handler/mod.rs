//! Inbound batch handling
//!
//! ## Pipeline (in order):
//! 1. Reject an empty batch (`ValidationFailed`)
//! 2. Validate every edit (`InvalidOperation` / `ValidationFailed`)
//! 3. Authorize each distinct collection (`AuthorizationDenied`)
//! 4. Commit through the orchestrator
//! 5. Fire the rebuild trigger; its failure never fails the request
//!
//! Steps 1-3 make no remote call.

mod auth;
mod rebuild;
mod wire;

pub use auth::{AllowAll, Authorizer, Principal, Role, RolePolicy};
pub use rebuild::{NoopRebuildTrigger, RebuildNotice, RebuildTrigger, WebhookRebuildTrigger};
pub use wire::{CommitRequest, CommitResponse, EditRequest, ErrorResponse};

use crate::orchestrator::{CommitOrchestrator, CommitOutcome};
use chrono::Utc;
use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::types::RequestContext;
use gitcms_core::{log_op_end, log_op_error, log_op_start, CollectionKind, Edit};
use gitcms_store::SnapshotRepository;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// How the rebuild trigger runs after a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Spawned onto the runtime; the response does not wait for it
    Detached,
    /// Awaited before returning (one-shot processes that exit right after)
    Inline,
}

/// Validates, authorizes and commits inbound batches
pub struct BatchHandler<R> {
    orchestrator: CommitOrchestrator<R>,
    authorizer: Arc<dyn Authorizer>,
    rebuild: Arc<dyn RebuildTrigger>,
    rebuild_mode: RebuildMode,
}

impl<R: SnapshotRepository> BatchHandler<R> {
    pub fn new(
        orchestrator: CommitOrchestrator<R>,
        authorizer: Arc<dyn Authorizer>,
        rebuild: Arc<dyn RebuildTrigger>,
    ) -> Self {
        Self {
            orchestrator,
            authorizer,
            rebuild,
            rebuild_mode: RebuildMode::Detached,
        }
    }

    pub fn with_rebuild_mode(mut self, mode: RebuildMode) -> Self {
        self.rebuild_mode = mode;
        self
    }

    pub fn orchestrator(&self) -> &CommitOrchestrator<R> {
        &self.orchestrator
    }

    /// Handle one batch on behalf of `principal`
    ///
    /// # Errors
    ///
    /// Validation and authorization errors before any remote call, then
    /// whatever the orchestrator surfaces. Every error carries the request
    /// id.
    pub async fn handle(
        &self,
        principal: &Principal,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        self.handle_in(RequestContext::new(), principal, request).await
    }

    /// [`handle`](Self::handle) under a caller-supplied request context
    pub async fn handle_in(
        &self,
        ctx: RequestContext,
        principal: &Principal,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        log_op_start!(
            "handle_batch",
            request_id = %ctx.request_id,
            trace_id = ctx.trace_id.as_ref().map(|t| t.as_str()),
            principal = %principal.id,
            edit_count = request.edits.len()
        );
        let start = Instant::now();

        let result = self
            .handle_impl(principal, request)
            .await
            .map_err(|e| e.with_request_id(ctx.request_id.clone()));

        match &result {
            Ok(response) => log_op_end!(
                "handle_batch",
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = %ctx.request_id,
                commit = %response.commit,
                attempts = response.attempts
            ),
            Err(err) => log_op_error!(
                "handle_batch",
                err,
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = %ctx.request_id
            ),
        }
        result
    }

    async fn handle_impl(
        &self,
        principal: &Principal,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        let edits = validate_batch(request.edits)?;

        let collections: BTreeSet<CollectionKind> = edits.iter().map(|e| e.collection).collect();
        for &collection in &collections {
            self.authorizer.authorize(principal, collection)?;
        }

        let message = request
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(edits.len(), &collections));

        let outcome = self.orchestrator.commit(edits, &message).await?;
        self.notify(&outcome).await;

        Ok(CommitResponse {
            success: true,
            commit: outcome.commit.to_string(),
            attempts: outcome.attempts,
            message,
        })
    }

    async fn notify(&self, outcome: &CommitOutcome) {
        let notice = RebuildNotice {
            commit: outcome.commit.to_string(),
            collections: outcome.collections.clone(),
            triggered_at: Utc::now(),
        };
        let trigger = Arc::clone(&self.rebuild);
        let deliver = async move {
            if let Err(err) = trigger.trigger(&notice).await {
                tracing::warn!(
                    commit = %notice.commit,
                    err_code = err.code(),
                    error = %err,
                    "Rebuild trigger failed; commit stands"
                );
            }
        };

        match self.rebuild_mode {
            RebuildMode::Detached => {
                tokio::spawn(deliver);
            }
            RebuildMode::Inline => deliver.await,
        }
    }
}

/// Turn wire edits into domain edits, rejecting an empty batch
///
/// # Errors
///
/// `ValidationFailed` for an empty batch, otherwise the first failure from
/// [`EditRequest::into_edit`].
pub fn validate_batch(requests: Vec<EditRequest>) -> Result<Vec<Edit>> {
    if requests.is_empty() {
        return Err(CmsError::new(ErrorKind::ValidationFailed)
            .with_op("validate_batch")
            .with_message("No edits provided"));
    }
    requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| request.into_edit(index))
        .collect()
}

/// `Update 3 item(s) in videos, build-orders`
pub fn default_message(count: usize, collections: &BTreeSet<CollectionKind>) -> String {
    let names: Vec<&str> = collections.iter().map(|c| c.tag()).collect();
    format!("Update {} item(s) in {}", count, names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message() {
        let collections: BTreeSet<_> = [CollectionKind::Videos, CollectionKind::BuildOrders]
            .into_iter()
            .collect();
        assert_eq!(
            default_message(3, &collections),
            "Update 3 item(s) in videos, build-orders"
        );
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = validate_batch(vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }
}
