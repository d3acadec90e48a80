//! Baton - sequential agent pipeline runner
//!
//! CLI entry point.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use baton::app::{run_pipeline, RunRequest};
use baton::cli::display;
use baton::config::RunnerConfig;

/// Sequential agent pipeline runner
///
/// Runs a fixed sequence of Claude Code steps against the current git
/// repository, handing results from step to step through files in a scratch
/// directory.
#[derive(Parser, Debug)]
#[command(name = "baton", version, about)]
struct Cli {
    /// Branch to compare the current changes against
    #[arg(default_value = "main")]
    base_branch: String,

    /// Pipeline to run (built-in: review, commit)
    #[arg(long, default_value = "review")]
    pipeline: String,

    /// TOML file with pipeline definitions replacing the built-in ones
    #[arg(long)]
    pipelines: Option<PathBuf>,

    /// Print the final artifact as-is instead of through a markdown renderer
    #[arg(long)]
    no_render: bool,
}

impl Cli {
    fn into_request(self, dir: PathBuf) -> RunRequest {
        RunRequest {
            dir,
            base_branch: self.base_branch,
            pipeline: self.pipeline,
            pipelines_file: self.pipelines,
            render: !self.no_render,
        }
    }
}

/// Shutdown listeners, registered before the run starts so a signal that
/// arrives while the workspace is being set up is still observed.
#[cfg(unix)]
struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Register SIGINT, SIGTERM and SIGHUP listeners.
    fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Resolves once any of the signals has been received.
    async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
            _ = self.hangup.recv() => {}
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    #[allow(clippy::unnecessary_wraps)]
    const fn install() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Process exit status for a run exit code; anything out of range is 1.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            display::print_error(&format!("Failed to install signal handlers: {e}"));
            return ExitCode::FAILURE;
        }
    };
    let config = RunnerConfig::from_env();

    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            display::print_error(&format!("Failed to read current directory: {e}"));
            return ExitCode::FAILURE;
        }
    };

    match run_pipeline(&cli.into_request(dir), &config, signals.recv()).await {
        Ok(run) => ExitCode::from(exit_status(run.exit_code())),
        Err(e) => {
            display::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["baton"]).unwrap();
        let request = cli.into_request(PathBuf::from("/src/app"));
        assert_eq!(request.base_branch, "main");
        assert_eq!(request.pipeline, "review");
        assert!(request.pipelines_file.is_none());
        assert!(request.render);
        assert_eq!(request.dir, PathBuf::from("/src/app"));
    }

    #[test]
    fn test_all_arguments() {
        let cli = Cli::try_parse_from([
            "baton",
            "develop",
            "--pipeline",
            "commit",
            "--pipelines",
            "ops/pipelines.toml",
            "--no-render",
        ])
        .unwrap();
        let request = cli.into_request(PathBuf::from("."));
        assert_eq!(request.base_branch, "develop");
        assert_eq!(request.pipeline, "commit");
        assert_eq!(
            request.pipelines_file,
            Some(PathBuf::from("ops/pipelines.toml"))
        );
        assert!(!request.render);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["baton", "--cycle", "coding"]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_before_first_poll_is_observed() {
        let signals = ShutdownSignals::install().unwrap();

        // Delivered while nothing is awaiting the listeners yet
        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(std::time::Duration::from_secs(5), signals.recv())
            .await
            .expect("hangup was not observed");
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(1), 1);
        assert_eq!(exit_status(130), 130);
        assert_eq!(exit_status(-1), 1);
        assert_eq!(exit_status(300), 1);
    }
}
