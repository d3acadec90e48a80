//! Shared test utilities
//!
//! Common helpers used across test modules. Only compiled in test builds.

use std::cell::RefCell;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use crate::agent::invoker::{AgentExit, AgentInvoker, InvokeError, Invocation};

/// What the scripted agent does on one invocation.
#[derive(Debug, Clone)]
pub enum StubAction {
    /// Write these files into the scratch directory, then exit 0
    Write(Vec<(String, String)>),
    /// Write text into the step's capture file, then exit 0
    Print(String),
    /// Write raw bytes into the step's capture file, then exit 0
    PrintBytes(Vec<u8>),
    /// Exit with this code without writing anything
    Exit(i32),
    /// Behave as if the binary could not be started
    LaunchError,
    /// Never finish
    Hang,
}

impl StubAction {
    /// Shorthand for `StubAction::Write`.
    #[must_use]
    pub fn write(files: &[(&str, &str)]) -> Self {
        Self::Write(
            files
                .iter()
                .map(|(name, body)| ((*name).to_string(), (*body).to_string()))
                .collect(),
        )
    }
}

/// `AgentInvoker` test double that replays a script, one action per call,
/// and records every invocation it receives.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    actions: RefCell<Vec<StubAction>>,
    calls: RefCell<Vec<Invocation>>,
    scratch_seen: RefCell<Vec<bool>>,
}

impl ScriptedInvoker {
    /// Create an invoker that plays `actions` in order.
    #[must_use]
    pub fn new(mut actions: Vec<StubAction>) -> Self {
        actions.reverse();
        Self {
            actions: RefCell::new(actions),
            ..Self::default()
        }
    }

    /// Invocations received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Number of invocations received so far.
    #[must_use]
    pub fn invocation_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Whether the scratch directory existed at each invocation.
    #[must_use]
    pub fn scratch_seen(&self) -> Vec<bool> {
        self.scratch_seen.borrow().clone()
    }
}

impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<AgentExit, InvokeError> {
        self.calls.borrow_mut().push(invocation.clone());
        self.scratch_seen
            .borrow_mut()
            .push(invocation.scratch_dir.is_dir());

        let action = self
            .actions
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| panic!("unexpected invocation of step '{}'", invocation.step));

        let ok = AgentExit {
            code: Some(0),
            duration_secs: 0,
        };

        match action {
            StubAction::Write(files) => {
                for (name, body) in files {
                    std::fs::write(invocation.scratch_dir.join(name), body).unwrap();
                }
                Ok(ok)
            }
            StubAction::Print(text) => {
                let path = invocation
                    .capture
                    .as_ref()
                    .expect("Print used on a step without a captured artifact");
                std::fs::write(path, text).unwrap();
                Ok(ok)
            }
            StubAction::PrintBytes(bytes) => {
                let path = invocation
                    .capture
                    .as_ref()
                    .expect("PrintBytes used on a step without a captured artifact");
                std::fs::write(path, bytes).unwrap();
                Ok(ok)
            }
            StubAction::Exit(code) => Ok(AgentExit {
                code: Some(code),
                duration_secs: 0,
            }),
            StubAction::LaunchError => Err(InvokeError::Launch {
                binary: "claude".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            StubAction::Hang => std::future::pending().await,
        }
    }
}

/// Run git in `dir`, panicking on failure.
pub fn git_in(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(["-c", "user.name=Baton Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed to run tests");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Write a file and commit it.
pub fn commit_file(dir: &Path, name: &str, contents: &str, message: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
    git_in(dir, &["add", name]);
    git_in(dir, &["commit", "-q", "-m", message]);
}

/// Create a repository on branch `main` with one commit.
#[must_use]
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git_in(dir.path(), &["init", "-q"]);
    git_in(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    commit_file(dir.path(), "README.md", "# fixture\n", "Initial commit");
    dir
}
