//! `vox deploy` — push local changes to the remote draft.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use vox_sync::{apply_mutations, plan_deploy_run, SyncScope};

use crate::config::CliConfig;
use crate::report::{confirm, Reporter};

/// Arguments for `vox deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Limit the deploy to specific resource ids (repeatable).
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Root directory of the managed tree.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Print the computed change-set without calling any mutation endpoint.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress non-essential output.
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl DeployArgs {
    pub async fn run(self) -> Result<()> {
        let reporter = Reporter::new(self.quiet);
        let client = CliConfig::load().client()?;
        let scope = SyncScope::from_ids(self.ids);

        let plan = plan_deploy_run(&client, &self.dir, &scope)
            .await
            .context("deploy planning failed")?;

        reporter.skipped_test_cases(plan.skipped_test_cases);
        reporter.change_set(&plan.changes);
        reporter.affected_agents(&plan.affected_agents);
        reporter.line(format!("{} change(s) detected", plan.changes.len()));

        if plan.mutations.is_empty() {
            reporter.line("Nothing to deploy.");
            return Ok(());
        }
        if self.dry_run {
            reporter.line(format!(
                "[dry-run] would apply {} mutation(s)",
                plan.mutations.len()
            ));
            return Ok(());
        }
        if !self.yes {
            let prompt = format!("Apply {} mutation(s) to the remote draft?", plan.mutations.len());
            if !confirm(&prompt).context("confirmation prompt failed")? {
                reporter.line("Aborted — no mutations issued.");
                return Ok(());
            }
        }

        let outcomes = apply_mutations(&client, plan.mutations).await;
        let failed = reporter.outcomes(&outcomes);
        if failed > 0 {
            bail!("{failed} of {} mutation(s) failed", outcomes.len());
        }
        Ok(())
    }
}
