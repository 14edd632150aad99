//! Print one collection as of the branch head

use crate::app::open_repository;
use clap::Args;
use gitcms_core::CollectionKind;
use gitcms_engine::AppConfig;
use gitcms_store::SnapshotRepository;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Collection tag, e.g. `videos` or `build-orders`
    #[arg(long)]
    pub collection: String,
}

pub async fn execute(args: ShowArgs, config: &AppConfig, memory: bool) -> anyhow::Result<()> {
    let kind: CollectionKind = args.collection.parse()?;
    let repository = open_repository(config, memory)?;

    let head = repository.head().await?;
    let snapshot = repository.fetch_snapshot(kind, &head).await?;

    eprintln!(
        "{} at {} (blob {})",
        snapshot.path,
        head.commit,
        snapshot.version_token.as_str()
    );
    println!("{}", serde_json::to_string_pretty(&snapshot.content)?);
    Ok(())
}
