//! Git query layer
//!
//! Resolves everything the pipeline needs to know about the repository once,
//! before the run starts: the repository root, the current branch (or a
//! detached marker) and whether the base branch exists. Nothing here is called
//! while steps are executing, and nothing here writes to the repository.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::PipelineError;
use crate::pipeline::prompt::ContextFields;

/// Context label for the repository root.
pub const LABEL_REPOSITORY_ROOT: &str = "repository root";
/// Context label for the current branch.
pub const LABEL_CURRENT_BRANCH: &str = "current branch";
/// Context label for the base branch.
pub const LABEL_BASE_BRANCH: &str = "base branch";

/// What HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    /// A checked-out local branch
    Named(String),
    /// HEAD points directly at a commit
    Detached,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Detached => f.write_str("(detached HEAD)"),
        }
    }
}

/// Repository facts resolved before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    /// Top-level directory of the working tree
    pub root: PathBuf,
    /// Current branch or detached marker
    pub branch: Branch,
    /// Base branch the changes are compared against
    pub base_branch: String,
}

impl RepoContext {
    /// Resolve repository facts starting from `dir`.
    ///
    /// Fails with `NotAGitRepository` outside a working tree, `DetachedHead`
    /// when `require_branch` is set and HEAD is detached, and
    /// `UnknownBaseBranch` when `base_branch` does not name a commit.
    pub fn resolve(
        dir: &Path,
        base_branch: &str,
        pipeline: &str,
        require_branch: bool,
    ) -> Result<Self, PipelineError> {
        let root = repository_root(dir)?;
        let branch = current_branch(&root)?;

        if require_branch && branch == Branch::Detached {
            return Err(PipelineError::DetachedHead {
                pipeline: pipeline.to_string(),
            });
        }

        if !ref_exists(&root, base_branch)? {
            return Err(PipelineError::UnknownBaseBranch {
                branch: base_branch.to_string(),
            });
        }

        Ok(Self {
            root,
            branch,
            base_branch: base_branch.to_string(),
        })
    }

    /// Initial context fields injected into every step's prompt.
    #[must_use]
    pub fn context_fields(&self) -> ContextFields {
        let mut fields = ContextFields::new();
        fields.insert(LABEL_REPOSITORY_ROOT, self.root.display().to_string());
        fields.insert(LABEL_CURRENT_BRANCH, self.branch.to_string());
        fields.insert(LABEL_BASE_BRANCH, self.base_branch.clone());
        fields
    }
}

/// Top-level directory of the working tree containing `dir`.
pub fn repository_root(dir: &Path) -> Result<PathBuf, PipelineError> {
    let output = git(dir, &["rev-parse", "--show-toplevel"])?;
    if !output.status.success() {
        return Err(PipelineError::NotAGitRepository {
            path: dir.to_path_buf(),
        });
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        // Inside a bare repository or the .git directory itself
        return Err(PipelineError::NotAGitRepository {
            path: dir.to_path_buf(),
        });
    }
    Ok(PathBuf::from(root))
}

/// Current branch name, or `Branch::Detached`.
pub fn current_branch(root: &Path) -> Result<Branch, PipelineError> {
    let output = git(root, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
    // `--quiet` exits 1 without output when HEAD is detached
    if !output.status.success() {
        return Ok(Branch::Detached);
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        Ok(Branch::Detached)
    } else {
        Ok(Branch::Named(name))
    }
}

/// Whether `reference` resolves to a commit.
pub fn ref_exists(root: &Path, reference: &str) -> Result<bool, PipelineError> {
    if reference.trim().is_empty() || reference.starts_with('-') {
        return Ok(false);
    }
    let spec = format!("{reference}^{{commit}}");
    let output = git(root, &["rev-parse", "--verify", "--quiet", &spec])?;
    Ok(output.status.success())
}

fn git(dir: &Path, args: &[&str]) -> Result<std::process::Output, PipelineError> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| PipelineError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{commit_file, git_in, init_repo};
    use tempfile::TempDir;

    #[test]
    fn test_branch_display() {
        assert_eq!(Branch::Named("feature-x".to_string()).to_string(), "feature-x");
        assert_eq!(Branch::Detached.to_string(), "(detached HEAD)");
    }

    #[test]
    fn test_outside_repository_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = RepoContext::resolve(dir.path(), "main", "review", false).unwrap_err();
        assert!(
            matches!(err, PipelineError::NotAGitRepository { .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_resolves_root_branch_and_base() {
        let repo = init_repo();
        git_in(repo.path(), &["checkout", "-q", "-b", "feature-x"]);
        commit_file(repo.path(), "feature.txt", "new work", "Add feature");

        let ctx = RepoContext::resolve(repo.path(), "main", "review", true).unwrap();
        assert_eq!(
            ctx.root.canonicalize().unwrap(),
            repo.path().canonicalize().unwrap()
        );
        assert_eq!(ctx.branch, Branch::Named("feature-x".to_string()));
        assert_eq!(ctx.base_branch, "main");
    }

    #[test]
    fn test_resolves_from_subdirectory() {
        let repo = init_repo();
        let sub = repo.path().join("nested").join("deeper");
        std::fs::create_dir_all(&sub).unwrap();

        let ctx = RepoContext::resolve(&sub, "main", "review", false).unwrap();
        assert_eq!(
            ctx.root.canonicalize().unwrap(),
            repo.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_unknown_base_branch_is_rejected() {
        let repo = init_repo();
        let err = RepoContext::resolve(repo.path(), "trunk", "review", false).unwrap_err();
        assert!(
            matches!(err, PipelineError::UnknownBaseBranch { ref branch } if branch == "trunk"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_option_like_base_branch_is_rejected() {
        let repo = init_repo();
        let err = RepoContext::resolve(repo.path(), "--all", "review", false).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownBaseBranch { .. }));
    }

    #[test]
    fn test_detached_head_allowed_unless_branch_required() {
        let repo = init_repo();
        git_in(repo.path(), &["checkout", "-q", "--detach"]);

        let ctx = RepoContext::resolve(repo.path(), "main", "review", false).unwrap();
        assert_eq!(ctx.branch, Branch::Detached);

        let err = RepoContext::resolve(repo.path(), "main", "commit", true).unwrap_err();
        assert!(
            matches!(err, PipelineError::DetachedHead { ref pipeline } if pipeline == "commit"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_context_fields_order() {
        let ctx = RepoContext {
            root: PathBuf::from("/src/app"),
            branch: Branch::Named("feature-x".to_string()),
            base_branch: "main".to_string(),
        };
        let fields = ctx.context_fields();
        let labels: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(
            labels,
            vec![LABEL_REPOSITORY_ROOT, LABEL_CURRENT_BRANCH, LABEL_BASE_BRANCH]
        );
        assert_eq!(fields.get(LABEL_CURRENT_BRANCH), Some("feature-x"));
    }
}
