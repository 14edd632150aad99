//! gitcms CLI
//!
//! Batched content commits against a git-backed site repository

use clap::{Parser, Subcommand};
use gitcms_cli::commands;
use gitcms_core::logging_facility::{self, Profile};
use gitcms_engine::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "gitcms")]
#[command(about = "gitcms - batched content commits to a git repository", long_about = None)]
struct Cli {
    /// Use a throwaway in-memory repository instead of GitHub
    #[arg(long, global = true)]
    memory: bool,

    /// Logging profile: development, production or test
    #[arg(long, global = true, env = "GITCMS_LOG_PROFILE", default_value = "development")]
    log_profile: Profile,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Commit a batch of edits from a JSON file
    Commit(commands::commit::CommitArgs),
    /// Print one collection at the branch head
    Show(commands::show::ShowArgs),
    /// Serve the batch commit HTTP API
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logging_facility::init(cli.log_profile);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Commit(args) => commands::commit::execute(args, &config, cli.memory).await,
        Commands::Show(args) => commands::show::execute(args, &config, cli.memory).await,
        Commands::Serve(args) => commands::serve::execute(args, &config, cli.memory).await,
    }
}
