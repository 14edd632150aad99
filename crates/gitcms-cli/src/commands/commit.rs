//! Commit a batch file

use crate::app::{batch_handler, open_repository};
use anyhow::Context;
use clap::Args;
use gitcms_engine::{AppConfig, CommitRequest, ErrorResponse, Principal, RebuildMode, Role};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CommitArgs {
    /// JSON file shaped like the HTTP request body: `{"edits": [...], "message": "..."}`
    #[arg(long)]
    pub file: PathBuf,

    /// Role to act with
    #[arg(long, default_value = "admin")]
    pub role: String,

    /// Principal id recorded in logs
    #[arg(long, default_value = "cli")]
    pub principal: String,
}

pub async fn execute(args: CommitArgs, config: &AppConfig, memory: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let request: CommitRequest = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a batch request", args.file.display()))?;
    let role: Role = args.role.parse()?;
    let principal = Principal::new(args.principal, vec![role]);

    let repository = open_repository(config, memory)?;
    // The process exits right after; deliver the rebuild before returning.
    let handler = batch_handler(config, repository, RebuildMode::Inline)?;

    match handler.handle(&principal, request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
            Err(err.into())
        }
    }
}
