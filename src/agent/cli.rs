//! Agent command builder
//!
//! Constructs the `std::process::Command` for one unattended agent
//! invocation: the prompt as a single `-p` argument, the model, the scratch
//! directory the agent may write to, and the step's allowed tools.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Options for building an agent command beyond the prompt itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Executable to run
    pub binary: String,
    /// Model identifier (maps to `--model`)
    pub model: String,
    /// Directory outside the working directory the agent may use (maps to `--add-dir`)
    pub scratch_dir: Option<PathBuf>,
    /// Permission strings (maps to `--allowedTools`)
    pub allowed_tools: Vec<String>,
}

/// Build a `Command` to invoke the agent non-interactively.
///
/// The prompt is passed as one opaque argument after `-p`, which also puts
/// the agent in print mode: it runs to completion without asking for input.
#[must_use]
pub fn build_command(prompt: &str, working_dir: &Path, options: &CommandOptions) -> Command {
    let mut cmd = Command::new(&options.binary);
    cmd.current_dir(working_dir);

    cmd.arg("-p").arg(prompt);

    if !options.model.is_empty() {
        cmd.arg("--model").arg(&options.model);
    }

    if let Some(dir) = &options.scratch_dir {
        cmd.arg("--add-dir").arg(dir);
    }

    // Variadic, so it must come last
    if !options.allowed_tools.is_empty() {
        cmd.arg("--allowedTools");
        for tool in &options.allowed_tools {
            cmd.arg(tool);
        }
    }

    cmd
}
