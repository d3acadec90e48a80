//! Error taxonomy for the pipeline engine
//!
//! Precondition and workspace errors abort a run before any step executes and
//! are returned as `PipelineError`. Step-scoped failures are carried on the
//! finished `Run` as a `StepFailure` so the caller knows exactly which step
//! stopped the pipeline.

use std::path::PathBuf;

/// Fatal errors raised before the first step runs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The working directory is not inside a git repository.
    #[error("not a git repository: {}", .path.display())]
    NotAGitRepository {
        /// Directory the lookup started from
        path: PathBuf,
    },

    /// The requested base branch or reference does not resolve to a commit.
    #[error("unknown base branch '{branch}'")]
    UnknownBaseBranch {
        /// The reference as given by the operator
        branch: String,
    },

    /// HEAD is detached but the pipeline needs a named branch.
    #[error("HEAD is detached; pipeline '{pipeline}' requires a checked-out branch")]
    DetachedHead {
        /// Pipeline that asked for a branch
        pipeline: String,
    },

    /// git itself could not be run or returned something unusable.
    #[error("git {command} failed: {message}")]
    Git {
        /// The git subcommand that failed
        command: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// The scratch directory could not be created.
    #[error("failed to create scratch directory {}: {source}", .path.display())]
    WorkspaceCreate {
        /// Directory we tried to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Why a single step ended in the `Failed` state.
#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    /// The agent binary could not be started at all.
    #[error("step '{step}': could not launch agent '{binary}': {source}")]
    Launch {
        /// Step name
        step: String,
        /// Binary we tried to run
        binary: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// The agent ran and exited non-zero (or was killed by a signal).
    #[error("step '{step}': agent process failed with exit code {}", exit_code_label(.code))]
    AgentExited {
        /// Step name
        step: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// The agent's stdout could not be written to the captured artifact.
    #[error("step '{step}': could not capture agent output into '{artifact}': {source}")]
    Capture {
        /// Step name
        step: String,
        /// Captured artifact name
        artifact: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The agent exited zero but a declared artifact is absent or empty.
    #[error(
        "step '{step}': agent exited successfully but did not produce artifact '{artifact}' ({} at {})",
        artifact_state(.empty),
        .path.display()
    )]
    MissingArtifact {
        /// Step name
        step: String,
        /// Declared artifact name
        artifact: String,
        /// Where the artifact was expected
        path: PathBuf,
        /// True when a zero-length file was found
        empty: bool,
    },
}

impl StepFailure {
    /// Name of the step that failed.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::Launch { step, .. }
            | Self::AgentExited { step, .. }
            | Self::Capture { step, .. }
            | Self::MissingArtifact { step, .. } => step,
        }
    }

    /// True when the agent process itself failed, as opposed to exiting
    /// cleanly without producing its output.
    #[must_use]
    pub const fn is_process_error(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. } | Self::AgentExited { .. } | Self::Capture { .. }
        )
    }
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn exit_code_label(code: &Option<i32>) -> String {
    format_exit_code(*code)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn artifact_state(empty: &bool) -> &'static str {
    if *empty {
        "empty file"
    } else {
        "no file"
    }
}

/// Format an exit code for display, returning "unknown" if the process was killed by signal.
#[must_use]
pub fn format_exit_code(exit_code: Option<i32>) -> String {
    exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}
