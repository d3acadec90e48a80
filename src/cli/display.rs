//! Terminal display for pipeline runs
//!
//! Everything here goes to stderr so stdout carries only what the agent
//! prints and the rendered final artifact.

use std::path::Path;

use colored::Colorize;

use crate::error::StepFailure;
use crate::git::RepoContext;
use crate::pipeline::runner::{Run, RunStatus};
use crate::pipeline::step::StepResult;

/// Print the run banner before the first step.
pub fn print_banner(pipeline: &str, repo: &RepoContext) {
    eprintln!(
        "\n{} {}",
        "===".bold().cyan(),
        format!("Pipeline: {pipeline}").bold().cyan()
    );
    eprintln!("  {} {}", "Repository:".dimmed(), repo.root.display());
    eprintln!(
        "  {} {} {} {}",
        "Branch:".dimmed(),
        repo.branch,
        "against".dimmed(),
        repo.base_branch
    );
}

/// Print the scratch directory once it exists.
pub fn print_workspace(path: &Path) {
    eprintln!("  {} {}", "Scratch:".dimmed(), path.display());
    eprintln!("{}", "─".repeat(50).dimmed());
}

/// Print the header for step `index` of `total` (1-based).
pub fn print_step_header(index: usize, total: usize, name: &str) {
    eprintln!(
        "\n{} {}",
        format!("[{index}/{total}]").bold().cyan(),
        name.bold()
    );
}

/// Print a one-line success note for a step.
pub fn print_step_succeeded(result: &StepResult) {
    let names: Vec<&str> = result.artifacts.iter().map(|a| a.name.as_str()).collect();
    let produced = if names.is_empty() {
        String::new()
    } else {
        format!(" -> {}", names.join(", "))
    };
    eprintln!(
        "  {} {}{} {}",
        "✓".green().bold(),
        result.step,
        produced.dimmed(),
        format_duration(result.duration_secs).dimmed()
    );
}

/// Print the reason a step failed.
pub fn print_step_failed(failure: &StepFailure) {
    eprintln!("  {} {}", "✗".red().bold(), failure.to_string().red());
}

/// Print a non-fatal warning.
pub fn print_warning(message: &str) {
    eprintln!("{} {message}", "warning:".yellow().bold());
}

/// Print an error that stops baton before or outside a run.
pub fn print_error(message: &str) {
    eprintln!("{} {message}", "error:".red().bold());
}

/// Announce that a run was interrupted.
pub fn print_interrupted(pipeline: &str) {
    eprintln!(
        "\n  {} {}",
        "⚠".yellow().bold(),
        format!("Interrupted: stopping pipeline '{pipeline}'").yellow()
    );
}

/// Print the end-of-run summary.
pub fn print_run_summary(run: &Run) {
    eprintln!("{}", "─".repeat(50).dimmed());

    let status = match run.status {
        RunStatus::Succeeded => "COMPLETED".green().bold().to_string(),
        RunStatus::Interrupted => "INTERRUPTED".yellow().bold().to_string(),
        RunStatus::Pending | RunStatus::Running | RunStatus::Failed => {
            "FAILED".red().bold().to_string()
        }
    };
    let total: usize = run.steps.len();
    let passed = run.steps.iter().filter(|s| s.succeeded()).count();
    eprintln!(
        "  {} {} {}",
        status,
        run.pipeline.bold(),
        format!(
            "({passed}/{total} steps, {})",
            format_duration(run.duration_secs())
        )
        .dimmed()
    );

    if let Some(failure) = run.failure() {
        eprintln!("  {failure}");
    }
    if run.retained {
        eprintln!(
            "  {} {}",
            "Scratch directory kept at".dimmed(),
            run.workspace.display()
        );
    }
    eprintln!();
}

/// Format seconds as `Xm Ys`, or `Ys` under a minute.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    let mins = secs / 60;
    let secs = secs % 60;
    if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
