//! Execution engine - slapdconf executor with UI integration

use anyhow::Result;
use colored::Colorize;
use declarative::{
    AutoConfirm, Cache, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan, Provider,
};
use std::io;

use super::differ::display_plan;
use crate::progress::ApplyProgress;

/// Options for apply (adds `yes` and `quiet` to the core options)
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub core: ExecuteOptions,
    /// Skip confirmation prompts
    pub yes: bool,
    pub quiet: bool,
}

/// Confirmation through an interactive terminal prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(io::Error::other)
    }
}

/// Show the plan, confirm, and converge it with progress output
pub fn execute<P: Provider + ?Sized>(
    provider: &P,
    cache: &mut Cache,
    plan: &ExecutionPlan,
    opts: &ApplyOptions,
) -> Result<ExecuteSummary> {
    if !opts.quiet {
        display_plan(provider.descriptor(), plan, opts.core.verbose);
    }

    let mut progress = ApplyProgress::new(opts.core.verbose, opts.quiet);
    let summary = if opts.yes || opts.core.dry_run {
        declarative::execute(provider, cache, plan, &opts.core, &mut progress, &mut AutoConfirm)?
    } else {
        println!();
        declarative::execute(provider, cache, plan, &opts.core, &mut progress, &mut PromptConfirm)?
    };

    if opts.core.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.total_changes() == 0 && summary.failed == 0 && summary.skipped > 0 {
        println!();
        println!("  {} Aborted", "✗".red());
    } else if !opts.quiet || !summary.is_success() {
        print_summary(&summary);
    }

    Ok(summary)
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        if summary.total_changes() == 0 {
            println!("  {} Already converged", "✓".green().bold());
        } else {
            println!(
                "  {} Configuration applied successfully!",
                "✓".green().bold()
            );
        }
    } else {
        println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.created > 0 {
        println!("    • {} database(s) created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} database(s) modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} database(s) removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} database(s) skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "database(s)".red());
    }
}
