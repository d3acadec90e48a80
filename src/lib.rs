//! Baton - sequential agent pipeline runner
//!
//! Baton drives the Claude Code CLI through a fixed sequence of named steps
//! against a git repository. Steps hand context to each other through files in
//! a per-run scratch directory, never through shared process memory.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod agent;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod log;
pub mod pipeline;
pub mod render;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use agent::invoker::{AgentExit, AgentInvoker, ClaudeInvoker, InvokeError, Invocation};
pub use config::RunnerConfig;
pub use error::{PipelineError, StepFailure};
pub use git::{Branch, RepoContext};
pub use pipeline::definition::{PipelineCatalog, PipelineDefinition, StepDefinition};
pub use pipeline::prompt::{build, ContextFields, Prompt};
pub use pipeline::runner::{InitialContext, PipelineRunner, Run, RunStatus};
pub use pipeline::workspace::{RunId, Workspace};
