//! Pipeline definitions
//!
//! Pipelines are described in TOML: a list of `[[pipeline]]` tables, each with
//! an ordered list of `[[pipeline.step]]` tables. The built-in `review` and
//! `commit` pipelines ship embedded in the binary; `--pipelines <file>`
//! replaces them with a user catalog. Definitions are validated on load and
//! immutable afterwards.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::agent::permissions::validate_permission;
use crate::pipeline::context::{artifact_label, output_label, RunContext};
use crate::pipeline::prompt::{ContextFields, Prompt};

const BUILTIN_PIPELINES: &str = include_str!("../../pipelines/builtin.toml");

/// How an artifact comes into existence.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    /// The agent writes the file itself
    #[default]
    File,
    /// The engine writes the agent's standard output to the file
    Captured,
}

/// An output a step must produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// File name inside the scratch directory
    pub name: String,
    /// Who writes the file
    #[serde(default)]
    pub mode: ArtifactMode,
}

/// One step of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepDefinition {
    /// Step name, unique within the pipeline
    pub name: String,
    /// Static instruction text sent verbatim after the context block
    pub instructions: String,
    /// Artifacts the step must produce
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
    /// Earlier artifacts to show this step; all of them when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
    /// Additional permissions for this step (additive to the pipeline's)
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl StepDefinition {
    /// The artifact whose content is the agent's captured stdout, if any.
    #[must_use]
    pub fn captured_artifact(&self) -> Option<&ArtifactSpec> {
        self.artifacts
            .iter()
            .find(|a| a.mode == ArtifactMode::Captured)
    }

    /// Whether the step is allowed to see an earlier artifact.
    #[must_use]
    pub fn reads(&self, artifact: &str) -> bool {
        self.inputs
            .as_ref()
            .map_or(true, |inputs| inputs.iter().any(|i| i == artifact))
    }

    /// Build this step's context from the run's current state.
    ///
    /// Base fields come first, then the earlier artifacts this step reads,
    /// then the locations this step must write its file artifacts to.
    #[must_use]
    pub fn build_context(&self, run: &RunContext, scratch_dir: &Path) -> ContextFields {
        let mut fields = run.base().clone();
        for artifact in run.artifacts() {
            if self.reads(&artifact.name) {
                fields.insert(
                    artifact_label(&artifact.name),
                    artifact.path.display().to_string(),
                );
            }
        }
        for spec in &self.artifacts {
            if spec.mode == ArtifactMode::File {
                fields.insert(
                    output_label(&spec.name),
                    scratch_dir.join(&spec.name).display().to_string(),
                );
            }
        }
        fields
    }

    /// Assemble the prompt for this step.
    #[must_use]
    pub fn prompt(&self, run: &RunContext, scratch_dir: &Path) -> Prompt {
        Prompt::new(self.build_context(run, scratch_dir), self.instructions.clone())
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineDefinition {
    /// Pipeline name used on the command line
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Fail up front when HEAD is detached
    #[serde(default)]
    pub requires_branch: bool,
    /// Permissions applied to every step
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Artifact shown to the operator after success; defaults to the last
    /// declared artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_artifact: Option<String>,
    /// Steps, executed in order
    #[serde(rename = "step", default)]
    pub steps: Vec<StepDefinition>,
}

impl PipelineDefinition {
    /// Name of the artifact to present after a successful run.
    #[must_use]
    pub fn final_artifact_name(&self) -> Option<&str> {
        self.final_artifact.as_deref().or_else(|| {
            self.steps
                .iter()
                .rev()
                .find_map(|s| s.artifacts.last())
                .map(|a| a.name.as_str())
        })
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Pipeline name cannot be empty");
        }
        if self.steps.is_empty() {
            bail!("Pipeline '{}' has no steps", self.name);
        }

        for perm in &self.permissions {
            validate_permission(perm).with_context(|| format!("in pipeline '{}'", self.name))?;
        }

        let mut step_names = HashSet::new();
        // Artifacts declared by the steps seen so far
        let mut produced: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            if step.name.trim().is_empty() {
                bail!("Pipeline '{}' has a step with an empty name", self.name);
            }
            if !step_names.insert(step.name.as_str()) {
                bail!("Duplicate step name '{}' in pipeline '{}'", step.name, self.name);
            }
            if step.instructions.trim().is_empty() {
                bail!("Step '{}' in pipeline '{}' has no instructions", step.name, self.name);
            }

            // Inputs may only name artifacts of earlier steps
            if let Some(inputs) = &step.inputs {
                for input in inputs {
                    if !produced.contains(input.as_str()) {
                        bail!(
                            "Step '{}' reads '{input}', which no earlier step in pipeline '{}' produces",
                            step.name,
                            self.name
                        );
                    }
                }
            }

            let captured = step
                .artifacts
                .iter()
                .filter(|a| a.mode == ArtifactMode::Captured)
                .count();
            if captured > 1 {
                bail!(
                    "Step '{}' in pipeline '{}' declares more than one captured artifact",
                    step.name,
                    self.name
                );
            }

            for artifact in &step.artifacts {
                validate_artifact_name(&artifact.name)
                    .with_context(|| format!("in step '{}'", step.name))?;
                if !produced.insert(artifact.name.as_str()) {
                    bail!(
                        "Artifact '{}' is declared more than once in pipeline '{}'",
                        artifact.name,
                        self.name
                    );
                }
            }

            for perm in &step.permissions {
                validate_permission(perm).with_context(|| format!("in step '{}'", step.name))?;
            }
        }

        if let Some(name) = &self.final_artifact {
            if !produced.contains(name.as_str()) {
                bail!(
                    "Pipeline '{}' names final artifact '{name}', which no step produces",
                    self.name
                );
            }
        }

        Ok(())
    }
}

/// Artifact names must be plain file names so they always resolve inside the
/// scratch directory.
fn validate_artifact_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        bail!("Invalid artifact name '{name}'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        bail!("Invalid artifact name '{name}': only letters, digits, '.', '_' and '-' are allowed");
    }
    Ok(())
}

/// The set of pipelines available to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineCatalog {
    /// Pipeline definitions
    #[serde(rename = "pipeline")]
    pub pipelines: Vec<PipelineDefinition>,
}

impl PipelineCatalog {
    /// The pipelines compiled into the binary.
    ///
    /// # Errors
    /// Returns an error if the embedded catalog fails validation
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_PIPELINES).context("Built-in pipeline catalog is invalid")
    }

    /// Parse a pipeline catalog from a file.
    ///
    /// # Arguments
    /// * `path` - TOML file whose pipelines replace the built-in ones
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The content is not valid TOML
    /// - Any pipeline fails validation
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse a pipeline catalog from TOML text.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a pipeline is invalid
    pub fn parse(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content).context("Failed to parse pipeline catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Find a pipeline by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Comma-separated pipeline names for error messages.
    #[must_use]
    pub fn names(&self) -> String {
        self.pipelines
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            // Names select pipelines on the command line
            if !seen.insert(pipeline.name.as_str()) {
                bail!("Duplicate pipeline name: '{}'", pipeline.name);
            }
            pipeline.validate()?;
        }
        Ok(())
    }
}
