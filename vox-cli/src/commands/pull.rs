//! `vox pull` — write the remote draft configuration into the local tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use vox_files::manifest;
use vox_sync::{pull, SyncScope};

use crate::config::CliConfig;
use crate::report::{confirm, Reporter};

/// Arguments for `vox pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Limit the pull to specific resource ids (repeatable).
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Root directory of the managed tree.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Show what would be written without touching any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress non-essential output.
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Skip the overwrite confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl PullArgs {
    pub async fn run(self) -> Result<()> {
        let reporter = Reporter::new(self.quiet);
        let client = CliConfig::load().client()?;
        let scope = SyncScope::from_ids(self.ids);

        // A tree that has been written before may carry local edits; get an
        // explicit go-ahead before overwriting them.
        let previously_written = manifest::manifest_path(&self.dir).exists();
        if previously_written && !self.dry_run && !self.yes {
            let prompt = format!(
                "Pull will overwrite managed files under {}. Continue?",
                self.dir.display()
            );
            if !confirm(&prompt).context("confirmation prompt failed")? {
                reporter.line("Aborted — nothing written.");
                return Ok(());
            }
        }

        let outcome = pull(&client, &self.dir, &scope, self.dry_run)
            .await
            .context("pull failed")?;

        reporter.skipped_test_cases(outcome.skipped_test_cases);
        reporter.write_summary(&outcome.summary, self.dry_run);
        Ok(())
    }
}
