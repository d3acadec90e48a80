//! Pipeline runner
//!
//! Executes a pipeline's steps strictly in order inside one scratch
//! workspace. Artifacts of each successful step are added to the context of
//! the steps after it. The first failed step ends the run; the steps after it
//! never start. The workspace is acquired before the first step and released
//! on every way out: success, failure or interruption.

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::invoker::AgentInvoker;
use crate::cli::display;
use crate::config::RunnerConfig;
use crate::error::{PipelineError, StepFailure};
use crate::git::RepoContext;
use crate::pipeline::context::{Artifact, RunContext, LABEL_SCRATCH_DIR};
use crate::pipeline::definition::PipelineDefinition;
use crate::pipeline::prompt::ContextFields;
use crate::pipeline::step::{StepExecutor, StepResult, StepStatus};
use crate::pipeline::workspace::{Release, RunId, Workspace};

/// Exit code reported for an interrupted run (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, workspace not yet acquired
    Pending,
    /// Steps executing
    Running,
    /// Every step succeeded
    Succeeded,
    /// A step failed
    Failed,
    /// Stopped by a signal
    Interrupted,
}

/// What the runner starts from: resolved before the run, never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContext {
    /// Directory the agent runs in
    pub working_dir: PathBuf,
    /// Fields shown to every step
    pub fields: ContextFields,
}

impl From<&RepoContext> for InitialContext {
    fn from(repo: &RepoContext) -> Self {
        Self {
            working_dir: repo.root.clone(),
            fields: repo.context_fields(),
        }
    }
}

/// The artifact presented to the operator after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    /// Artifact name
    pub name: String,
    /// Where it was (or still is, when retained)
    pub path: PathBuf,
    /// Its text, read before the workspace was released
    pub contents: String,
}

/// One execution of a pipeline.
#[derive(Debug)]
pub struct Run {
    /// Unique run id
    pub id: RunId,
    /// Pipeline name
    pub pipeline: String,
    /// Scratch directory
    pub workspace: PathBuf,
    /// Whether the scratch directory was kept
    pub retained: bool,
    /// Overall status
    pub status: RunStatus,
    /// Results of the steps that ran, in order
    pub steps: Vec<StepResult>,
    /// Final artifact of a successful run
    pub final_artifact: Option<FinalArtifact>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    fn new(id: RunId, pipeline: &str, workspace: PathBuf) -> Self {
        Self {
            id,
            pipeline: pipeline.to_string(),
            workspace,
            retained: false,
            status: RunStatus::Pending,
            steps: Vec::new(),
            final_artifact: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// The failure that stopped the run, if a step failed.
    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure> {
        self.steps.iter().find_map(|s| s.failure.as_ref())
    }

    /// Every artifact produced during the run, in production order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.steps.iter().flat_map(|s| s.artifacts.iter())
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Succeeded => 0,
            RunStatus::Interrupted => EXIT_INTERRUPTED,
            RunStatus::Pending | RunStatus::Running | RunStatus::Failed => 1,
        }
    }

    /// Total duration in seconds, once finished.
    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.finished_at.map_or(0, |end| {
            u64::try_from((end - self.started_at).num_seconds()).unwrap_or(0)
        })
    }
}

/// Runs pipelines with a given configuration and agent.
pub struct PipelineRunner<'a, I> {
    config: &'a RunnerConfig,
    invoker: &'a I,
}

impl<'a, I: AgentInvoker> PipelineRunner<'a, I> {
    /// Create a runner.
    #[must_use]
    pub const fn new(config: &'a RunnerConfig, invoker: &'a I) -> Self {
        Self { config, invoker }
    }

    /// Run `pipeline` to completion.
    pub async fn run(
        &self,
        pipeline: &PipelineDefinition,
        initial: &InitialContext,
    ) -> Result<Run, PipelineError> {
        self.run_until(pipeline, initial, std::future::pending())
            .await
    }

    /// Run `pipeline`, stopping early if `interrupt` resolves first.
    ///
    /// Returns `Err` only when the workspace cannot be created, in which case
    /// no step has run. Every other outcome is a `Run` whose status says how
    /// it ended.
    pub async fn run_until<F>(
        &self,
        pipeline: &PipelineDefinition,
        initial: &InitialContext,
        interrupt: F,
    ) -> Result<Run, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let id = RunId::generate();
        let mut workspace = Workspace::acquire(&self.config.work_root, &id, self.config.keep_work_dir)?;
        let mut run = Run::new(id, &pipeline.name, workspace.path().to_path_buf());
        run.status = RunStatus::Running;
        display::print_workspace(workspace.path());

        let interrupted = {
            let steps = self.execute_steps(pipeline, initial, &workspace, &mut run);
            tokio::select! {
                biased;
                () = interrupt => true,
                () = steps => false,
            }
        };

        if interrupted {
            run.status = RunStatus::Interrupted;
            display::print_interrupted(&run.pipeline);
        } else if run.status == RunStatus::Succeeded {
            run.final_artifact = read_final_artifact(pipeline, &run);
        }

        match workspace.release() {
            Ok(Release::Retained(_)) => run.retained = true,
            Ok(Release::Removed | Release::AlreadyReleased) => {}
            Err(e) => display::print_warning(&format!(
                "Failed to remove scratch directory {}: {e}",
                workspace.path().display()
            )),
        }

        run.finished_at = Some(Utc::now());
        Ok(run)
    }

    async fn execute_steps(
        &self,
        pipeline: &PipelineDefinition,
        initial: &InitialContext,
        workspace: &Workspace,
        run: &mut Run,
    ) {
        let mut context = RunContext::new(initial.fields.clone());
        context.insert_base(LABEL_SCRATCH_DIR, workspace.path());

        for index in 0..pipeline.steps.len() {
            let result = StepExecutor::new(pipeline, index, self.invoker)
                .execute(&context, workspace, &initial.working_dir)
                .await;

            let status = result.status;
            for artifact in &result.artifacts {
                context.record(artifact.clone());
            }
            run.steps.push(result);

            if status == StepStatus::Failed {
                run.status = RunStatus::Failed;
                return;
            }
        }

        run.status = RunStatus::Succeeded;
    }
}

fn read_final_artifact(pipeline: &PipelineDefinition, run: &Run) -> Option<FinalArtifact> {
    let name = pipeline.final_artifact_name()?;
    let artifact = run.artifacts().find(|a| a.name == name)?;
    // Agent output is not guaranteed to be valid UTF-8
    match std::fs::read(&artifact.path) {
        Ok(bytes) => Some(FinalArtifact {
            name: artifact.name.clone(),
            path: artifact.path.clone(),
            contents: String::from_utf8_lossy(&bytes).into_owned(),
        }),
        Err(e) => {
            display::print_warning(&format!(
                "Failed to read final artifact {}: {e}",
                artifact.path.display()
            ));
            None
        }
    }
}
