//! Run the HTTP API

use crate::app::{batch_handler, open_repository};
use crate::server::{router, AppState};
use anyhow::Context;
use clap::Args;
use gitcms_engine::{AppConfig, RebuildMode};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address; overrides GITCMS_BIND
    #[arg(long)]
    pub bind: Option<String>,
}

pub async fn execute(args: ServeArgs, config: &AppConfig, memory: bool) -> anyhow::Result<()> {
    let mut server = config.server.clone();
    if let Some(bind) = args.bind {
        server = server.with_bind(bind);
    }
    if server.token_count() == 0 {
        tracing::warn!("GITCMS_API_TOKENS is empty; every commit request will be rejected");
    }

    let repository = open_repository(config, memory)?;
    let handler = batch_handler(config, repository, RebuildMode::Detached)?;
    let state = AppState::new(Arc::new(handler), Arc::new(server.clone()));

    let listener = tokio::net::TcpListener::bind(&server.bind)
        .await
        .with_context(|| format!("binding {}", server.bind))?;
    tracing::info!(bind = %server.bind, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
