//! Progress indicators for the slapdconf CLI.

use colored::Colorize;
use declarative::{ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::engine::redact_payload;

/// A spinner for a single blocking step
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "✗".red(), msg);
}

/// Reports each converged database, with a spinner over parallel batches
pub struct ApplyProgress {
    spinner: Option<ProgressBar>,
    verbose: bool,
    quiet: bool,
}

impl ApplyProgress {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            spinner: None,
            verbose,
            quiet,
        }
    }

    fn println(&self, line: &str) {
        match &self.spinner {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&mut self, count: usize, parallel: bool) {
        if self.quiet {
            return;
        }
        println!();
        println!(
            "  {} Applying {} change{}{}...",
            "→".cyan(),
            count,
            if count == 1 { "" } else { "s" },
            if parallel { " in parallel" } else { "" }
        );
        if parallel {
            // Parallel results arrive together when the batch ends
            self.spinner = Some(spinner(&format!("Converging {count} databases...")));
        }
    }

    fn on_entry_start(&mut self, _name: &str, description: &str) {
        log::info!("Converging {description}");
    }

    fn on_entry_complete(&mut self, name: &str, result: &ApplyResult) {
        let line = match result {
            ApplyResult::NoChange => return,
            ApplyResult::Created => format!("    {} {} {}", "+".green(), name, "created".dimmed()),
            ApplyResult::Modified => {
                format!("    {} {} {}", "~".yellow(), name, "modified".dimmed())
            }
            ApplyResult::Removed => format!("    {} {} {}", "-".red(), name, "removed".dimmed()),
            ApplyResult::Skipped { reason } => {
                format!("    {} {} {}", "⊘".dimmed(), name, reason.dimmed())
            }
            ApplyResult::Failed { error, payload } => {
                let mut line = format!("    {} {}: {}", "✗".red(), name, error.red());
                if self.verbose
                    && let Some(payload) = payload
                {
                    for payload_line in redact_payload(payload).lines() {
                        line.push_str(&format!("\n        {}", payload_line.dimmed()));
                    }
                }
                line
            }
        };

        // Failures are always reported, even with --quiet
        if self.quiet && result.is_success() {
            return;
        }
        self.println(&line);
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}
