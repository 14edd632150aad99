//! Wiring shared by every command: repository, rebuild hook, handler

use anyhow::Context;
use gitcms_core::{CollectionKind, SnapshotContent};
use gitcms_engine::{
    AppConfig, BatchHandler, CommitOrchestrator, NoopRebuildTrigger, RebuildMode, RebuildTrigger,
    RolePolicy, WebhookRebuildTrigger,
};
use gitcms_store::{GitHubRepository, MemoryRepository, SnapshotRepository};
use std::sync::Arc;

/// Repository chosen at runtime
pub type DynRepository = Arc<dyn SnapshotRepository>;

/// Handler over whichever repository was configured
pub type DynBatchHandler = BatchHandler<DynRepository>;

/// In-memory repository holding an empty file for every collection
pub fn memory_repository() -> anyhow::Result<MemoryRepository> {
    let files = CollectionKind::all()
        .iter()
        .map(|&kind| (kind, SnapshotContent::empty_for(kind)));
    Ok(MemoryRepository::with_collections(files)?)
}

/// GitHub repository from config, or an in-memory one when `memory` is set
pub fn open_repository(config: &AppConfig, memory: bool) -> anyhow::Result<DynRepository> {
    if memory {
        tracing::info!("Using in-memory repository");
        return Ok(Arc::new(memory_repository()?));
    }

    let github = config
        .require_github()
        .context("no repository configured (pass --memory for a throwaway one)")?;
    tracing::info!(
        owner = %github.owner,
        repo = %github.repo,
        branch = %github.branch,
        "Using GitHub repository"
    );
    Ok(Arc::new(GitHubRepository::new(github.clone())?))
}

pub fn rebuild_trigger(config: &AppConfig) -> anyhow::Result<Arc<dyn RebuildTrigger>> {
    match &config.rebuild.hook_url {
        Some(url) => {
            let timeout = config
                .github
                .as_ref()
                .map(|g| g.timeout)
                .unwrap_or(std::time::Duration::from_secs(30));
            Ok(Arc::new(WebhookRebuildTrigger::new(url.clone(), timeout)?))
        }
        None => Ok(Arc::new(NoopRebuildTrigger)),
    }
}

pub fn batch_handler(
    config: &AppConfig,
    repository: DynRepository,
    mode: RebuildMode,
) -> anyhow::Result<DynBatchHandler> {
    let orchestrator = CommitOrchestrator::new(repository, config.commit.clone());
    Ok(
        BatchHandler::new(orchestrator, Arc::new(RolePolicy), rebuild_trigger(config)?)
            .with_rebuild_mode(mode),
    )
}
