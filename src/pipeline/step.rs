//! Step executor
//!
//! Executes one step as an explicit state machine:
//!
//! ```text
//! NotStarted -> Building -> Invoking -> Verifying -> Succeeded
//!                              |            |
//!                              +-> Failed <-+
//! ```
//!
//! A failed step is terminal. There is no retry; the runner stops the
//! pipeline at the first failure.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::agent::invoker::{AgentInvoker, InvokeError, Invocation};
use crate::agent::permissions::resolve_permissions;
use crate::cli::display;
use crate::error::StepFailure;
use crate::pipeline::context::{Artifact, RunContext};
use crate::pipeline::definition::{PipelineDefinition, StepDefinition};
use crate::pipeline::workspace::Workspace;

/// Lifecycle state of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Not yet begun
    NotStarted,
    /// Gathering context and rendering the prompt
    Building,
    /// Agent process running
    Invoking,
    /// Checking declared artifacts
    Verifying,
    /// All artifacts present
    Succeeded,
    /// Agent failed or an artifact is missing
    Failed,
}

impl StepState {
    /// Whether the machine may move from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Building)
                | (Self::Building, Self::Invoking)
                | (Self::Invoking, Self::Verifying | Self::Failed)
                | (Self::Verifying, Self::Succeeded | Self::Failed)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Terminal outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Agent exited zero and every artifact is present
    Succeeded,
    /// The step stopped the pipeline
    Failed,
}

/// Outcome of executing one step. Never mutated once produced.
#[derive(Debug)]
pub struct StepResult {
    /// Step name
    pub step: String,
    /// Terminal status
    pub status: StepStatus,
    /// Resolved artifact paths (empty on failure)
    pub artifacts: Vec<Artifact>,
    /// Why the step failed
    pub failure: Option<StepFailure>,
    /// States visited, in order
    pub states: Vec<StepState>,
    /// Wall-clock duration in seconds
    pub duration_secs: u64,
}

impl StepResult {
    /// Whether the step succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Drives a single step through its state machine.
pub struct StepExecutor<'a, I> {
    pipeline: &'a PipelineDefinition,
    step: &'a StepDefinition,
    invoker: &'a I,
    position: (usize, usize),
    state: StepState,
    states: Vec<StepState>,
}

impl<'a, I: AgentInvoker> StepExecutor<'a, I> {
    /// Prepare to execute `step`, the `index`-th (0-based) of `pipeline`.
    #[must_use]
    pub fn new(
        pipeline: &'a PipelineDefinition,
        index: usize,
        invoker: &'a I,
    ) -> Self {
        Self {
            pipeline,
            step: &pipeline.steps[index],
            invoker,
            position: (index + 1, pipeline.steps.len()),
            state: StepState::NotStarted,
            states: vec![StepState::NotStarted],
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> StepState {
        self.state
    }

    fn advance(&mut self, next: StepState) {
        assert!(
            self.state.can_advance_to(next),
            "illegal step transition {:?} -> {next:?} in step '{}'",
            self.state,
            self.step.name
        );
        self.state = next;
        self.states.push(next);
    }

    /// Run the step to a terminal state.
    ///
    /// `working_dir` is where the agent runs; artifacts always resolve inside
    /// `workspace`.
    pub async fn execute(
        mut self,
        run: &RunContext,
        workspace: &Workspace,
        working_dir: &Path,
    ) -> StepResult {
        let start = Instant::now();
        let (index, total) = self.position;
        display::print_step_header(index, total, &self.step.name);

        self.advance(StepState::Building);
        let prompt = self.step.prompt(run, workspace.path());
        let invocation = Invocation {
            step: self.step.name.clone(),
            prompt: prompt.render(),
            working_dir: working_dir.to_path_buf(),
            scratch_dir: workspace.path().to_path_buf(),
            capture: self
                .step
                .captured_artifact()
                .map(|a| workspace.artifact_path(&a.name)),
            allowed_tools: resolve_permissions(self.pipeline, self.step),
        };

        self.advance(StepState::Invoking);
        let outcome = self.invoker.invoke(&invocation).await;
        match outcome {
            Ok(exit) if exit.success() => {}
            Ok(exit) => {
                let failure = StepFailure::AgentExited {
                    step: self.step.name.clone(),
                    code: exit.code,
                };
                return self.fail(failure, start);
            }
            Err(err) => {
                let failure = self.invoke_failure(err);
                return self.fail(failure, start);
            }
        }

        self.advance(StepState::Verifying);
        let artifacts = match self.verify(workspace) {
            Ok(artifacts) => artifacts,
            Err(failure) => return self.fail(failure, start),
        };

        self.advance(StepState::Succeeded);
        let result = StepResult {
            step: self.step.name.clone(),
            status: StepStatus::Succeeded,
            artifacts,
            failure: None,
            states: self.states,
            duration_secs: start.elapsed().as_secs(),
        };
        display::print_step_succeeded(&result);
        result
    }

    /// Every declared artifact must be a non-empty regular file.
    fn verify(&self, workspace: &Workspace) -> Result<Vec<Artifact>, StepFailure> {
        let mut artifacts = Vec::with_capacity(self.step.artifacts.len());
        for spec in &self.step.artifacts {
            let path = workspace.artifact_path(&spec.name);
            let (present, empty) = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => (meta.len() > 0, meta.len() == 0),
                _ => (false, false),
            };
            if !present {
                return Err(StepFailure::MissingArtifact {
                    step: self.step.name.clone(),
                    artifact: spec.name.clone(),
                    path,
                    empty,
                });
            }
            artifacts.push(Artifact {
                name: spec.name.clone(),
                path,
            });
        }
        Ok(artifacts)
    }

    fn invoke_failure(&self, err: InvokeError) -> StepFailure {
        let step = self.step.name.clone();
        match err {
            InvokeError::Launch { binary, source } => StepFailure::Launch {
                step,
                binary,
                source,
            },
            InvokeError::Capture { source, .. } => StepFailure::Capture {
                step,
                artifact: self
                    .step
                    .captured_artifact()
                    .map(|a| a.name.clone())
                    .unwrap_or_default(),
                source,
            },
            InvokeError::Wait(_) => StepFailure::AgentExited { step, code: None },
        }
    }

    fn fail(mut self, failure: StepFailure, start: Instant) -> StepResult {
        self.advance(StepState::Failed);
        display::print_step_failed(&failure);
        StepResult {
            step: self.step.name.clone(),
            status: StepStatus::Failed,
            artifacts: Vec::new(),
            failure: Some(failure),
            states: self.states,
            duration_secs: start.elapsed().as_secs(),
        }
    }
}
