//! Terminal reporting for the sync commands.
//!
//! [`Reporter`] is an explicit value threaded through the commands — the
//! quiet flag lives here, not in process-wide state. Library crates log via
//! `tracing`; everything the user is meant to read goes through this type.

use std::collections::BTreeSet;

use colored::Colorize;
use serde_json::Value;
use similar::TextDiff;
use tabled::{settings::Style, Table, Tabled};

use vox_api::MutationOutcome;
use vox_files::WriteSummary;
use vox_sync::{ChangeSet, DiffEntry, DiffKind, ResourceChange};

/// Explicit output context; replaces any global quiet/log-mode flag.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    quiet: bool,
}

#[derive(Tabled)]
struct ChangeTableRow {
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "resource")]
    resource: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "changes")]
    changes: usize,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Reporter { quiet }
    }

    pub fn line(&self, text: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", text.as_ref());
        }
    }

    /// Failures are printed even in quiet mode.
    pub fn error_line(&self, text: impl AsRef<str>) {
        eprintln!("{}", text.as_ref());
    }

    // -----------------------------------------------------------------------
    // Change sets
    // -----------------------------------------------------------------------

    pub fn change_set(&self, changes: &ChangeSet) {
        if self.quiet {
            return;
        }
        if changes.is_empty() {
            println!("{} no differences", "✓".green());
            return;
        }

        let mut rows = Vec::new();
        let kinds: [(&'static str, &[ResourceChange]); 6] = [
            ("llm", &changes.llms),
            ("flow", &changes.conversation_flows),
            ("component", &changes.components),
            ("voice agent", &changes.voice_agents),
            ("chat agent", &changes.chat_agents),
            ("test case", &changes.test_cases),
        ];
        for (kind, group) in kinds {
            for change in group {
                rows.push(ChangeTableRow {
                    kind,
                    resource: change.name.clone().unwrap_or_else(|| "—".to_string()),
                    id: change.id.clone(),
                    changes: change.differences.len(),
                });
            }
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for (kind, group) in kinds {
            for change in group {
                self.change_details(kind, change);
            }
        }
    }

    fn change_details(&self, kind: &str, change: &ResourceChange) {
        let label = change.name.as_deref().unwrap_or(&change.id);
        println!("{} {}", kind.bold(), label.bold());
        for entry in &change.differences {
            self.diff_entry(entry);
        }
    }

    fn diff_entry(&self, entry: &DiffEntry) {
        let path = entry.path_string();
        match entry.kind {
            DiffKind::Create if entry.path.is_empty() => {
                println!("  {} (new resource)", "+".green());
            }
            DiffKind::Create => {
                println!("  {} {path}: {}", "+".green(), preview(entry.value.as_ref()));
            }
            DiffKind::Remove => {
                println!(
                    "  {} {path}: {}",
                    "-".red(),
                    preview(entry.old_value.as_ref())
                );
            }
            DiffKind::Change => {
                if let Some(diff) = text_diff(entry) {
                    println!("  {} {path}:", "~".yellow());
                    print!("{diff}");
                } else {
                    println!(
                        "  {} {path}: {} → {}",
                        "~".yellow(),
                        preview(entry.old_value.as_ref()),
                        preview(entry.value.as_ref()),
                    );
                }
            }
        }
    }

    pub fn affected_agents(&self, affected: &BTreeSet<String>) {
        if self.quiet || affected.is_empty() {
            return;
        }
        println!(
            "affected agents: {}",
            affected
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    pub fn skipped_test_cases(&self, skipped: usize) {
        if skipped > 0 {
            self.line(format!(
                "{} skipped {skipped} unreadable test case(s)",
                "!".yellow()
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Outcomes
    // -----------------------------------------------------------------------

    /// Print per-mutation results and the aggregate; returns the failure
    /// count.
    pub fn outcomes(&self, outcomes: &[MutationOutcome]) -> usize {
        let mut failed = 0usize;
        for outcome in outcomes {
            match &outcome.result {
                Ok(()) => self.line(format!("  {} {}", "✓".green(), outcome.mutation)),
                Err(err) => {
                    failed += 1;
                    self.error_line(format!("  {} {}: {err}", "✗".red(), outcome.mutation));
                }
            }
        }
        self.line(format!(
            "{} applied, {} failed",
            outcomes.len() - failed,
            failed
        ));
        failed
    }

    pub fn write_summary(&self, summary: &WriteSummary, dry_run: bool) {
        let prefix = if dry_run { "[dry-run] " } else { "" };
        self.line(format!(
            "{prefix}{} written, {} unchanged, {} removed",
            summary.written(),
            summary.unchanged(),
            summary.removed()
        ));
    }
}

/// Unified diff for multi-line string changes, indented for the terminal.
fn text_diff(entry: &DiffEntry) -> Option<String> {
    let (Some(Value::String(old)), Some(Value::String(new))) =
        (entry.old_value.as_ref(), entry.value.as_ref())
    else {
        return None;
    };
    if !old.contains('\n') && !new.contains('\n') {
        return None;
    }
    let old = format!("{old}\n");
    let new = format!("{new}\n");
    let diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(2)
        .to_string();
    Some(
        diff.lines()
            .map(|l| format!("    {l}\n"))
            .collect::<String>(),
    )
}

fn preview(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "∅".to_string();
    };
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{head}…")
    } else {
        text
    }
}

/// Ask for confirmation on stdout/stdin. Any answer but an explicit yes is
/// a no.
pub fn confirm(prompt: &str) -> std::io::Result<bool> {
    use std::io::Write;
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes" | "YES"))
}
