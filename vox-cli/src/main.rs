//! vox — keep remote agent configuration and a local file tree in sync.
//!
//! # Usage
//!
//! ```text
//! vox pull    [--id <id>]... [--dir <path>] [--dry-run] [--quiet] [--yes]
//! vox deploy  [--id <id>]... [--dir <path>] [--dry-run] [--quiet] [--yes]
//! vox publish [--id <id>]... [--dry-run] [--quiet] [--yes]
//! ```
//!
//! Configuration: `VOX_API_KEY` / `VOX_API_URL`, or `~/.config/vox/config.toml`.
//! Logging: `VOX_LOG` (tracing env-filter syntax, default `warn`).

mod commands;
mod config;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{deploy::DeployArgs, publish::PublishArgs, pull::PullArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "vox",
    version,
    about = "Sync remote voice/chat agent configuration with a local file tree",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the remote draft configuration into the local tree.
    Pull(PullArgs),

    /// Diff the local tree against the remote draft and push the changes.
    Deploy(DeployArgs),

    /// Promote drafts to published and rebind phone numbers.
    Publish(PublishArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // One control flow issuing concurrent I/O; no worker threads needed.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Commands::Pull(args) => runtime.block_on(args.run()),
        Commands::Deploy(args) => runtime.block_on(args.run()),
        Commands::Publish(args) => runtime.block_on(args.run()),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("VOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
