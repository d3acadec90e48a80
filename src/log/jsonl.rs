//! JSONL (JSON Lines) history of pipeline runs
//!
//! Every finished run is appended to `<work_root>/runs.jsonl` as one line.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use crate::pipeline::runner::{Run, RunStatus};
use crate::pipeline::step::{StepResult, StepStatus};

/// File name of the run log inside the work root.
pub const LOG_FILE: &str = "runs.jsonl";

/// One step of a logged run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name
    pub step: String,
    /// Terminal status
    pub status: StepStatus,
    /// Names of the artifacts it produced
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Failure message, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration in seconds
    pub duration_secs: u64,
}

impl From<&StepResult> for StepRecord {
    fn from(result: &StepResult) -> Self {
        Self {
            step: result.step.clone(),
            status: result.status,
            artifacts: result.artifacts.iter().map(|a| a.name.clone()).collect(),
            error: result.failure.as_ref().map(ToString::to_string),
            duration_secs: result.duration_secs,
        }
    }
}

/// One logged run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    /// Run id
    pub run_id: String,
    /// Pipeline name
    pub pipeline: String,
    /// Base branch the run compared against
    pub base_branch: String,
    /// How the run ended
    pub status: RunStatus,
    /// When it started
    pub started_at: DateTime<Utc>,
    /// When it finished
    pub finished_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: u64,
    /// Steps that ran, in order
    pub steps: Vec<StepRecord>,
    /// Scratch directory, recorded only when it was kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained_workspace: Option<PathBuf>,
}

impl RunRecord {
    /// Summarize a finished run.
    #[must_use]
    pub fn from_run(run: &Run, base_branch: &str) -> Self {
        Self {
            run_id: run.id.to_string(),
            pipeline: run.pipeline.clone(),
            base_branch: base_branch.to_string(),
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at.unwrap_or_else(Utc::now),
            duration_secs: run.duration_secs(),
            steps: run.steps.iter().map(StepRecord::from).collect(),
            retained_workspace: run.retained.then(|| run.workspace.clone()),
        }
    }

    /// Name of the step that failed, if any.
    #[must_use]
    pub fn failed_step(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| s.step.as_str())
    }
}

/// Append-only logger for run history.
///
/// Writes `runs.jsonl` under the work root, one finished run per line.
pub struct RunLogger {
    log_path: PathBuf,
}

impl RunLogger {
    /// Create a logger writing into `log_dir`.
    ///
    /// # Arguments
    /// * `log_dir` - Directory holding `runs.jsonl` (normally the work root)
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        // The work root may not exist before the first run
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join(LOG_FILE),
        })
    }

    /// Append a run record to the log.
    ///
    /// # Arguments
    /// * `record` - The finished run to record
    ///
    /// # Errors
    /// Returns an error if:
    /// - The log file cannot be opened or created
    /// - The record cannot be serialized
    /// - Writing the line fails
    pub fn append(&self, record: &RunRecord) -> Result<()> {
        // Append, creating the file on first use
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json = serde_json::to_string(record).context("Failed to serialize run record")?;

        // One record per line
        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read every run record.
    ///
    /// # Returns
    /// All records in the order they were appended, oldest first
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is not a record
    pub fn read_all(&self) -> Result<Vec<RunRecord>> {
        // No runs logged yet
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        content
            .lines()
            .enumerate()
            // Blank lines are tolerated
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse line {} as JSON", n + 1))
            })
            .collect()
    }

    /// Path of the log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
