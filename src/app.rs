//! Top-level flow of one `baton` invocation
//!
//! Loads the pipeline, checks the repository preconditions, runs the
//! pipeline, records it in the run log and presents the final artifact.
//! Preconditions are checked before the workspace exists, so a refused run
//! leaves nothing behind.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::agent::invoker::ClaudeInvoker;
use crate::cli::display;
use crate::config::RunnerConfig;
use crate::git::RepoContext;
use crate::log::{RunLogger, RunRecord};
use crate::pipeline::definition::PipelineCatalog;
use crate::pipeline::runner::{InitialContext, PipelineRunner, Run, RunStatus};
use crate::render;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Directory to resolve the repository from
    pub dir: PathBuf,
    /// Branch the changes are compared against
    pub base_branch: String,
    /// Pipeline name
    pub pipeline: String,
    /// Pipeline catalog to use instead of the built-in one
    pub pipelines_file: Option<PathBuf>,
    /// Pipe the final artifact through a markdown renderer
    pub render: bool,
}

/// Load the requested catalog.
pub fn load_catalog(request: &RunRequest) -> Result<PipelineCatalog> {
    match &request.pipelines_file {
        Some(path) => PipelineCatalog::from_path(path)
            .with_context(|| format!("Failed to load pipelines from '{}'", path.display())),
        None => PipelineCatalog::builtin().context("Failed to load built-in pipelines"),
    }
}

/// Run the requested pipeline with the Claude agent until it finishes or
/// `interrupt` resolves.
///
/// `Err` means the run never started: bad catalog, unknown pipeline, a
/// failed repository precondition or an unusable work root.
pub async fn run_pipeline<F>(
    request: &RunRequest,
    config: &RunnerConfig,
    interrupt: F,
) -> Result<Run>
where
    F: Future<Output = ()>,
{
    let catalog = load_catalog(request)?;
    let pipeline = catalog.get(&request.pipeline).with_context(|| {
        format!(
            "Unknown pipeline '{}'. Available pipelines: {}",
            request.pipeline,
            catalog.names()
        )
    })?;

    let repo = RepoContext::resolve(
        &request.dir,
        &request.base_branch,
        &pipeline.name,
        pipeline.requires_branch,
    )?;
    display::print_banner(&pipeline.name, &repo);

    let invoker = ClaudeInvoker::new(config);
    let run = PipelineRunner::new(config, &invoker)
        .run_until(pipeline, &InitialContext::from(&repo), interrupt)
        .await?;

    if let Err(e) = record_run(config, &run, &repo.base_branch) {
        display::print_warning(&format!("{e:#}"));
    }
    display::print_run_summary(&run);

    if run.status == RunStatus::Succeeded {
        if let Some(artifact) = &run.final_artifact {
            render::present(&artifact.contents, request.render).await;
        }
    }

    Ok(run)
}

fn record_run(config: &RunnerConfig, run: &Run, base_branch: &str) -> Result<()> {
    let logger = RunLogger::new(&config.work_root)?;
    logger
        .append(&RunRecord::from_run(run, base_branch))
        .context("Failed to write to run log")
}
