//! Permission strings for the agent's `--allowedTools` flag
//!
//! A step runs with the union of its pipeline's permissions and its own,
//! pipeline permissions first, duplicates dropped.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::pipeline::definition::{PipelineDefinition, StepDefinition};

/// Resolve the effective permissions for a step by merging pipeline-level and
/// step-specific permissions. Returns a deduplicated list with pipeline
/// permissions first, followed by any step-specific additions.
#[must_use]
pub fn resolve_permissions(pipeline: &PipelineDefinition, step: &StepDefinition) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for perm in pipeline.permissions.iter().chain(&step.permissions) {
        if seen.insert(perm.as_str()) {
            result.push(perm.clone());
        }
    }

    result
}

/// Validate that a permission string matches `--allowedTools` syntax:
/// either `ToolName` (bare) or `ToolName(specifier)`.
///
/// Tool names must start with an uppercase ASCII letter and contain only
/// ASCII alphanumeric characters.
pub fn validate_permission(perm: &str) -> Result<()> {
    if perm.is_empty() {
        bail!("Invalid permission '': permission string cannot be empty");
    }

    let tool_end = perm
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(perm.len());
    let tool_name = &perm[..tool_end];

    if tool_name.is_empty() || !tool_name.starts_with(|c: char| c.is_ascii_uppercase()) {
        bail!("Invalid permission '{perm}': tool name must start with an uppercase letter");
    }

    let rest = &perm[tool_end..];
    if rest.is_empty() {
        return Ok(());
    }

    if !rest.starts_with('(') || !rest.ends_with(')') {
        bail!("Invalid permission '{perm}': expected format 'ToolName' or 'ToolName(specifier)'");
    }

    if rest.len() == 2 {
        bail!("Invalid permission '{perm}': specifier inside parentheses cannot be empty");
    }

    Ok(())
}
