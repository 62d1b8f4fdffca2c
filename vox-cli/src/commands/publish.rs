//! `vox publish` — promote remote drafts to published, then rebind phone
//! numbers to the freshly published agent versions.

use anyhow::{bail, Context, Result};
use clap::Args;

use vox_sync::{apply_mutations, plan_publish_run, rebind_phone_numbers, SyncScope};

use crate::config::CliConfig;
use crate::report::{confirm, Reporter};

/// Arguments for `vox publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Limit the publish to specific resource ids (repeatable).
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

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

impl PublishArgs {
    pub async fn run(self) -> Result<()> {
        let reporter = Reporter::new(self.quiet);
        let client = CliConfig::load().client()?;
        let scope = SyncScope::from_ids(self.ids);

        let plan = plan_publish_run(&client, &scope)
            .await
            .context("publish planning failed")?;

        reporter.change_set(&plan.changes);
        reporter.affected_agents(&plan.affected_agents);
        reporter.line(format!("{} change(s) since last publish", plan.changes.len()));

        if plan.mutations.is_empty() {
            reporter.line("Everything is already published.");
            return Ok(());
        }
        if self.dry_run {
            reporter.line(format!(
                "[dry-run] would publish {} agent(s)",
                plan.mutations.len()
            ));
            return Ok(());
        }
        if !self.yes {
            let prompt = format!("Publish {} agent(s)?", plan.mutations.len());
            if !confirm(&prompt).context("confirmation prompt failed")? {
                reporter.line("Aborted — no mutations issued.");
                return Ok(());
            }
        }

        let outcomes = apply_mutations(&client, plan.mutations).await;
        let publish_failed = reporter.outcomes(&outcomes);

        // The rebind pass depends on which publishes actually landed, so it
        // only starts once the whole batch has settled.
        let rebind = rebind_phone_numbers(&client, &outcomes)
            .await
            .context("phone number rebinding failed")?;
        let rebind_failed = if rebind.mutations.is_empty() {
            reporter.line("No phone numbers needed rebinding.");
            0
        } else {
            reporter.line(format!(
                "Rebinding {} phone number(s):",
                rebind.mutations.len()
            ));
            reporter.outcomes(&rebind.outcomes)
        };

        let failed = publish_failed + rebind_failed;
        if failed > 0 {
            bail!("{failed} mutation(s) failed");
        }
        Ok(())
    }
}
