//! Run context threaded between steps
//!
//! The run context starts with the repository facts resolved before the run
//! and grows by one `artifact <name>` field per artifact produced by a
//! successful step. Growth is strictly additive: a label, once set, keeps its
//! first value for the rest of the run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::prompt::ContextFields;

/// Context label for the run's scratch directory.
pub const LABEL_SCRATCH_DIR: &str = "scratch directory";

/// Label under which an earlier step's artifact appears in later prompts.
#[must_use]
pub fn artifact_label(name: &str) -> String {
    format!("artifact {name}")
}

/// Label telling a step where to write one of its own file artifacts.
#[must_use]
pub fn output_label(name: &str) -> String {
    format!("output {name}")
}

/// A file produced by a step inside the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Declared artifact name (a plain file name)
    pub name: String,
    /// Resolved location inside the scratch directory
    pub path: PathBuf,
}

/// Context accumulated over the course of one run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    base: ContextFields,
    artifacts: Vec<Artifact>,
}

impl RunContext {
    /// Start a run context from the initial fields.
    #[must_use]
    pub const fn new(base: ContextFields) -> Self {
        Self {
            base,
            artifacts: Vec::new(),
        }
    }

    /// Add a base field unless the label is already present.
    pub fn insert_base(&mut self, label: &str, value: &Path) {
        self.base.insert(label, value.display().to_string());
    }

    /// Record an artifact produced by a completed step.
    ///
    /// Returns `false` and leaves the context untouched when an artifact with
    /// the same name was already recorded.
    pub fn record(&mut self, artifact: Artifact) -> bool {
        if self.artifacts.iter().any(|a| a.name == artifact.name) {
            return false;
        }
        self.artifacts.push(artifact);
        true
    }

    /// Repository-level fields shared by every step.
    #[must_use]
    pub const fn base(&self) -> &ContextFields {
        &self.base
    }

    /// Artifacts of completed steps, in production order.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Look up a produced artifact by name.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// All fields: base first, then one line per produced artifact.
    #[must_use]
    pub fn fields(&self) -> ContextFields {
        let mut fields = self.base.clone();
        for artifact in &self.artifacts {
            fields.insert(artifact_label(&artifact.name), artifact.path.display().to_string());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, dir: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            path: Path::new(dir).join(name),
        }
    }

    #[test]
    fn test_fields_lists_base_then_artifacts() {
        let base: ContextFields = [("repository root", "/src/app")].into_iter().collect();
        let mut ctx = RunContext::new(base);
        ctx.record(artifact("changes.md", "/tmp/run"));
        ctx.record(artifact("findings.md", "/tmp/run"));

        assert_eq!(
            ctx.fields().render(),
            "repository root: /src/app\n\
             artifact changes.md: /tmp/run/changes.md\n\
             artifact findings.md: /tmp/run/findings.md"
        );
    }

    #[test]
    fn test_record_never_overwrites() {
        let mut ctx = RunContext::default();
        assert!(ctx.record(artifact("changes.md", "/tmp/first")));
        assert!(!ctx.record(artifact("changes.md", "/tmp/second")));
        assert_eq!(
            ctx.artifact("changes.md").unwrap().path,
            PathBuf::from("/tmp/first/changes.md")
        );
        assert_eq!(ctx.artifacts().len(), 1);
    }

    #[test]
    fn test_insert_base_keeps_first_value() {
        let mut ctx = RunContext::default();
        ctx.insert_base(LABEL_SCRATCH_DIR, Path::new("/tmp/run-1"));
        ctx.insert_base(LABEL_SCRATCH_DIR, Path::new("/tmp/run-2"));
        assert_eq!(ctx.base().get(LABEL_SCRATCH_DIR), Some("/tmp/run-1"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(artifact_label("changes.md"), "artifact changes.md");
        assert_eq!(output_label("review.md"), "output review.md");
    }
}
