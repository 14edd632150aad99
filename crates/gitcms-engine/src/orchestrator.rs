//! Atomic commit orchestrator
//!
//! Lands a batch of edits as exactly one commit on the branch, or fails
//! without moving the branch.
//!
//! ## Attempt state machine
//!
//! ```text
//! Fetching -> Applying -> Committing -> AdvancingRef -> Done
//!    ^                                       |
//!    +---------------- Retry <---------------+ (conflict, attempts left)
//!
//! any state -> Failed
//! ```
//!
//! `Retry` carries nothing forward: every attempt reads the head and the
//! snapshots again and replays the whole batch on top of them. The edit
//! replay is idempotent for redundant creates and deletes, so folding in a
//! concurrent writer's commit is just another replay.
//!
//! ## Failure surfacing
//!
//! - Fetch failures (`NotFound`, `RemoteUnavailable`, `Serialization`) are
//!   returned as-is.
//! - Failures while writing blobs, the tree, the commit or the ref are
//!   wrapped as `CommitFailed` with the cause attached. Orphaned objects are
//!   left for the store's garbage collection.
//! - Losing the compare-and-swap on the last attempt is
//!   `CommitConflictExhausted`.

use crate::config::CommitConfig;
use gitcms_core::canonical::serialize_content;
use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::{
    apply_changes, group_by_collection, log_op_end, log_op_error, log_op_start,
    prune_dangling_references, CollectionKind, Edit, Operation, RepositoryState,
};
use gitcms_store::{AdvanceOutcome, CommitHandle, Head, SnapshotRepository, TreeEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// A batch that landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit: CommitHandle,
    /// 1 unless a concurrent writer forced a replay
    pub attempts: u32,
    /// Collections whose files changed in the commit
    pub collections: Vec<CollectionKind>,
}

/// One step of one attempt
enum AttemptState {
    Fetching,
    Applying {
        head: Head,
        base: RepositoryState,
    },
    Committing {
        head: Head,
        base: RepositoryState,
        next: RepositoryState,
    },
    AdvancingRef {
        head: Head,
        commit: CommitHandle,
        collections: Vec<CollectionKind>,
    },
    Retry,
    Done(CommitOutcome),
    Failed(CmsError),
}

impl AttemptState {
    fn name(&self) -> &'static str {
        match self {
            AttemptState::Fetching => "fetching",
            AttemptState::Applying { .. } => "applying",
            AttemptState::Committing { .. } => "committing",
            AttemptState::AdvancingRef { .. } => "advancing_ref",
            AttemptState::Retry => "retry",
            AttemptState::Done(_) => "done",
            AttemptState::Failed(_) => "failed",
        }
    }
}

/// The grouped batch plus everything derived from it once per call
struct Plan {
    grouped: BTreeMap<CollectionKind, Vec<Edit>>,
    /// Touched collections, plus media referrers when media is deleted
    fetch_set: BTreeSet<CollectionKind>,
    prune: bool,
}

impl Plan {
    fn new(edits: &[Edit]) -> Self {
        let grouped = group_by_collection(edits);
        let prune = grouped
            .get(&CollectionKind::MEDIA)
            .is_some_and(|edits| edits.iter().any(|e| e.operation == Operation::Delete));

        let mut fetch_set: BTreeSet<CollectionKind> = grouped.keys().copied().collect();
        if prune {
            fetch_set.extend(CollectionKind::media_referrers());
        }

        Self {
            grouped,
            fetch_set,
            prune,
        }
    }
}

/// Drives a batch through the attempt state machine
pub struct CommitOrchestrator<R> {
    repository: R,
    config: CommitConfig,
}

impl<R: SnapshotRepository> CommitOrchestrator<R> {
    pub fn new(repository: R, config: CommitConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Commit `edits` as one commit with `message`
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for an empty batch (no remote call is made)
    /// - `NotFound` / `RemoteUnavailable` / `Serialization` while fetching
    /// - `CommitFailed` while writing objects or moving the branch
    /// - `CommitConflictExhausted` after `max_attempts` lost races
    pub async fn commit(&self, edits: Vec<Edit>, message: &str) -> Result<CommitOutcome> {
        log_op_start!("commit", edit_count = edits.len());
        let start = Instant::now();

        let result = self.run(&edits, message).await;

        match &result {
            Ok(outcome) => log_op_end!(
                "commit",
                duration_ms = start.elapsed().as_millis() as u64,
                commit = %outcome.commit,
                attempts = outcome.attempts,
                collection_count = outcome.collections.len()
            ),
            Err(err) => log_op_error!(
                "commit",
                err,
                duration_ms = start.elapsed().as_millis() as u64
            ),
        }
        result
    }

    async fn run(&self, edits: &[Edit], message: &str) -> Result<CommitOutcome> {
        if edits.is_empty() {
            return Err(CmsError::new(ErrorKind::ValidationFailed)
                .with_op("commit")
                .with_message("Batch contains no edits"));
        }
        self.config.validate()?;

        let plan = Plan::new(edits);
        let mut attempt: u32 = 1;
        let mut state = AttemptState::Fetching;

        loop {
            tracing::trace!(attempt, state = state.name(), "Commit state");
            state = match state {
                AttemptState::Fetching => match self.fetch(&plan).await {
                    Ok((head, base)) => AttemptState::Applying { head, base },
                    Err(err) => AttemptState::Failed(err),
                },

                AttemptState::Applying { head, base } => match apply_batch(&base, &plan) {
                    Ok(next) => AttemptState::Committing { head, base, next },
                    Err(err) => AttemptState::Failed(err),
                },

                AttemptState::Committing { head, base, next } => {
                    match self.write_commit(&head, &base, &next, message).await {
                        Ok((commit, collections)) => AttemptState::AdvancingRef {
                            head,
                            commit,
                            collections,
                        },
                        Err(err) => AttemptState::Failed(err),
                    }
                }

                AttemptState::AdvancingRef {
                    head,
                    commit,
                    collections,
                } => match self.repository.advance_branch(&head.commit, &commit).await {
                    Ok(AdvanceOutcome::Advanced) => AttemptState::Done(CommitOutcome {
                        commit,
                        attempts: attempt,
                        collections,
                    }),
                    Ok(AdvanceOutcome::Conflict) if attempt < self.config.max_attempts => {
                        AttemptState::Retry
                    }
                    Ok(AdvanceOutcome::Conflict) => AttemptState::Failed(
                        CmsError::new(ErrorKind::CommitConflictExhausted)
                            .with_op("commit")
                            .with_message(
                                "The branch kept moving while saving; please re-submit",
                            ),
                    ),
                    Err(err) => AttemptState::Failed(commit_failed("advance_branch", err)),
                },

                AttemptState::Retry => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        "Branch advanced concurrently, replaying batch"
                    );
                    tokio::time::sleep(self.config.backoff_for(attempt)).await;
                    attempt += 1;
                    AttemptState::Fetching
                }

                AttemptState::Done(outcome) => return Ok(outcome),

                AttemptState::Failed(err) => return Err(err.with_attempts(attempt)),
            };
        }
    }

    /// Read the head, then every collection in the fetch set at that head
    async fn fetch(&self, plan: &Plan) -> Result<(Head, RepositoryState)> {
        let head = self.repository.head().await?;
        let mut state = RepositoryState::new();

        for &kind in &plan.fetch_set {
            match self.repository.fetch_snapshot(kind, &head).await {
                Ok(snapshot) => state.insert(snapshot),
                // Referrers are only fetched for pruning; a missing file
                // has nothing to prune.
                Err(err)
                    if err.kind() == ErrorKind::NotFound && !plan.grouped.contains_key(&kind) =>
                {
                    tracing::debug!(collection = %kind, "Skipping absent referrer collection");
                }
                Err(err) => return Err(err.with_collection(kind)),
            }
        }

        tracing::debug!(
            head = %head.commit,
            collection_count = state.len(),
            "Fetched snapshots"
        );
        Ok((head, state))
    }

    /// Write blobs for changed collections, a tree over the head tree and a
    /// commit on top of the head
    async fn write_commit(
        &self,
        head: &Head,
        base: &RepositoryState,
        next: &RepositoryState,
        message: &str,
    ) -> Result<(CommitHandle, Vec<CollectionKind>)> {
        let changed = next.changed_since(base);
        let mut entries = Vec::with_capacity(changed.len());

        for &kind in &changed {
            let Some(snapshot) = next.get(kind) else {
                continue;
            };
            let bytes = serialize_content(&snapshot.content)
                .map_err(|e| commit_failed("serialize_content", e).with_collection(kind))?;
            let blob = self
                .repository
                .create_blob(&bytes)
                .await
                .map_err(|e| commit_failed("create_blob", e).with_collection(kind))?;
            entries.push(TreeEntry::new(snapshot.path.clone(), blob));
        }

        if entries.is_empty() {
            tracing::info!(head = %head.commit, "Batch changes no content; committing head tree");
        }

        let tree = self
            .repository
            .create_tree(&head.tree, &entries)
            .await
            .map_err(|e| commit_failed("create_tree", e))?;
        let commit = self
            .repository
            .create_commit(&tree, &head.commit, message)
            .await
            .map_err(|e| commit_failed("create_commit", e))?;

        Ok((commit, changed))
    }
}

/// Apply the batch, then prune references to deleted media
fn apply_batch(base: &RepositoryState, plan: &Plan) -> Result<RepositoryState> {
    let next = apply_changes(base.clone(), &plan.grouped)?;
    if !plan.prune {
        return Ok(next);
    }

    let valid_ids = next
        .get(CollectionKind::MEDIA)
        .map(|snapshot| snapshot.content.ids())
        .unwrap_or_default();
    Ok(prune_dangling_references(next, &valid_ids))
}

fn commit_failed(op: &str, cause: CmsError) -> CmsError {
    CmsError::new(ErrorKind::CommitFailed)
        .with_op(op)
        .with_message(format!("Could not write the commit ({})", cause.code()))
        .with_source(cause)
}
