//! Scratch workspace for a single run
//!
//! Every run gets its own directory under the work root, named after the run
//! id. The directory is created exclusively, so two runs can never share it.
//! `release` deletes it (or keeps it when retention is requested) and runs at
//! most once; `Drop` performs the same removal if release never happened.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::PipelineError;

/// Unique identifier of one run: UTC timestamp with nanoseconds plus pid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Generate an id for a run started now by this process.
    #[must_use]
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.9fZ");
        Self(format!("{stamp}-{}", std::process::id()))
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What `release` did with the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Directory tree was deleted
    Removed,
    /// Retention was requested; directory left in place
    Retained(PathBuf),
    /// A previous call already released the workspace
    AlreadyReleased,
}

/// Scoped ownership of a run's scratch directory.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    retain: bool,
    released: bool,
}

impl Workspace {
    /// Create `base_dir/run-<run_id>`.
    ///
    /// `base_dir` is created if missing; the run directory itself must not
    /// exist yet.
    pub fn acquire(base_dir: &Path, run_id: &RunId, retain: bool) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(base_dir).map_err(|source| PipelineError::WorkspaceCreate {
            path: base_dir.to_path_buf(),
            source,
        })?;

        let path = base_dir.join(format!("run-{run_id}"));
        std::fs::create_dir(&path).map_err(|source| PipelineError::WorkspaceCreate {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            retain,
            released: false,
        })
    }

    /// Path of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory will be kept on release.
    #[must_use]
    pub const fn retains(&self) -> bool {
        self.retain
    }

    /// Resolve an artifact name to its location inside the workspace.
    #[must_use]
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Delete the directory tree unless retention was requested.
    pub fn release(&mut self) -> io::Result<Release> {
        if self.released {
            return Ok(Release::AlreadyReleased);
        }
        self.released = true;

        if self.retain {
            return Ok(Release::Retained(self.path.clone()));
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(Release::Removed),
            // Someone else cleaned up already; the end state is what we want
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Release::Removed),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released && !self.retain {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
