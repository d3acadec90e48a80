//! Agent invocation
//!
//! Runs the agent as a child process with standard input closed and waits for
//! it to exit. Standard error is always inherited so the operator watches the
//! agent work live. Standard output is inherited too, unless the step captures
//! it into an artifact, in which case every chunk is echoed to the terminal and
//! appended to the artifact file. Retries are not this module's business.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command as TokioCommand;

use crate::agent::cli::{build_command, CommandOptions};
use crate::config::RunnerConfig;

/// Everything needed to run the agent once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Step the invocation belongs to
    pub step: String,
    /// Fully rendered prompt
    pub prompt: String,
    /// Directory the agent runs in (the repository root)
    pub working_dir: PathBuf,
    /// The run's scratch directory
    pub scratch_dir: PathBuf,
    /// File receiving the agent's stdout, when the step captures it
    pub capture: Option<PathBuf>,
    /// Resolved `--allowedTools` permissions
    pub allowed_tools: Vec<String>,
}

/// How the agent process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    /// Exit code (None if killed by signal)
    pub code: Option<i32>,
    /// Wall-clock duration in seconds
    pub duration_secs: u64,
}

impl AgentExit {
    /// Whether the agent exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Failures that prevent an exit status from being observed normally.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The binary could not be started (missing, not executable, ...)
    #[error("failed to launch '{binary}': {source}")]
    Launch {
        /// Binary we tried to run
        binary: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// Writing captured output failed.
    #[error("failed to capture output into {}: {source}", .path.display())]
    Capture {
        /// Capture file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("failed waiting for agent process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs the external agent for one step.
#[allow(async_fn_in_trait)]
pub trait AgentInvoker {
    /// Run the agent to completion and report how it exited.
    ///
    /// A non-zero exit is reported through `AgentExit`, not as an error.
    async fn invoke(&self, invocation: &Invocation) -> Result<AgentExit, InvokeError>;
}

/// Invokes the Claude Code CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeInvoker {
    binary: String,
    model: String,
}

impl ClaudeInvoker {
    /// Create an invoker using the configured binary and model.
    #[must_use]
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            binary: config.agent_binary.clone(),
            model: config.model.clone(),
        }
    }

    fn command(&self, invocation: &Invocation) -> std::process::Command {
        build_command(
            &invocation.prompt,
            &invocation.working_dir,
            &CommandOptions {
                binary: self.binary.clone(),
                model: self.model.clone(),
                scratch_dir: Some(invocation.scratch_dir.clone()),
                allowed_tools: invocation.allowed_tools.clone(),
            },
        )
    }
}

impl AgentInvoker for ClaudeInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<AgentExit, InvokeError> {
        run_command(self.command(invocation), invocation.capture.as_deref()).await
    }
}

/// Run a command unattended and wait for it.
///
/// The child is killed if the returned future is dropped before completion,
/// which is how an interrupted run stops its in-flight agent.
pub async fn run_command(
    cmd: std::process::Command,
    capture: Option<&Path>,
) -> Result<AgentExit, InvokeError> {
    let binary = cmd.get_program().to_string_lossy().to_string();

    let mut tokio_cmd = TokioCommand::from(cmd);
    tokio_cmd
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .stdout(if capture.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = tokio_cmd
        .spawn()
        .map_err(|source| InvokeError::Launch { binary, source })?;

    if let Some(path) = capture {
        let capture_err = |source| InvokeError::Capture {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(path).await.map_err(capture_err)?;
        if let Some(mut stdout) = child.stdout.take() {
            tee(&mut stdout, &mut tokio::io::stdout(), &mut file)
                .await
                .map_err(capture_err)?;
        }
        file.flush().await.map_err(capture_err)?;
    }

    let status = child.wait().await.map_err(InvokeError::Wait)?;

    Ok(AgentExit {
        code: status.code(),
        duration_secs: start.elapsed().as_secs(),
    })
}

/// Copy `reader` into `file`, echoing each chunk to `terminal`.
///
/// The echo is best effort: once a terminal write fails (a closed pipe under
/// `baton | head`) echoing stops and the copy carries on.
///
/// # Errors
///
/// Returns an error if reading from `reader` or writing to `file` fails.
async fn tee<R, T, F>(reader: &mut R, terminal: &mut T, file: &mut F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    T: AsyncWrite + Unpin,
    F: AsyncWrite + Unpin,
{
    let mut echo = true;
    let mut buf = vec![0_u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if echo {
            echo = terminal.write_all(&buf[..n]).await.is_ok() && terminal.flush().await.is_ok();
        }
        file.write_all(&buf[..n]).await?;
    }
}
