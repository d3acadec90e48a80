//! Final artifact presentation
//!
//! Pipes markdown through the richest renderer installed on `PATH`, falling
//! back to printing it verbatim. Cosmetic only: nothing here affects the
//! outcome of a run.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A markdown renderer reading its input from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    /// Executable name looked up on `PATH`
    pub program: &'static str,
    /// Arguments making it read markdown from stdin and not page
    pub args: &'static [&'static str],
}

/// Renderers in order of preference.
pub const RENDERERS: &[Renderer] = &[
    Renderer {
        program: "glow",
        args: &["-"],
    },
    Renderer {
        program: "mdcat",
        args: &[],
    },
    Renderer {
        program: "bat",
        args: &["--language", "markdown", "--paging", "never", "--style", "plain"],
    },
];

/// How the artifact ended up on the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presented {
    /// Rendered by this program
    Rendered(&'static str),
    /// Printed as-is
    Plain,
}

/// Look up `program` in a `PATH`-style list of directories.
#[must_use]
pub fn find_on_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// The first installed renderer, with its resolved path.
#[must_use]
pub fn select_renderer(path_var: Option<&OsStr>) -> Option<(Renderer, PathBuf)> {
    let path_var = path_var?;
    RENDERERS
        .iter()
        .find_map(|r| find_on_path(r.program, path_var).map(|bin| (*r, bin)))
}

/// Show `markdown` on stdout, rendered when `render` is set and a renderer
/// is installed.
pub async fn present(markdown: &str, render: bool) -> Presented {
    if render {
        let path_var = std::env::var_os("PATH");
        if let Some((renderer, bin)) = select_renderer(path_var.as_deref()) {
            if pipe_through(&bin, renderer.args, markdown).await {
                return Presented::Rendered(renderer.program);
            }
        }
    }

    let mut stdout = tokio::io::stdout();
    // Nothing useful to do if the terminal is gone.
    let _ = stdout.write_all(markdown.as_bytes()).await;
    if !markdown.ends_with('\n') {
        let _ = stdout.write_all(b"\n").await;
    }
    let _ = stdout.flush().await;
    Presented::Plain
}

/// Feed `input` to `bin` on stdin.
///
/// Returns `false` only when `bin` could not be started. Once it runs it
/// shares our stdout, so a later failure may already have printed part of
/// the text and falling back would show it twice.
async fn pipe_through(bin: &Path, args: &[&str], input: &str) -> bool {
    let Ok(mut child) = Command::new(bin)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::null())
        .spawn()
    else {
        return false;
    };

    if let Some(mut stdin) = child.stdin.take() {
        // A renderer that exits early closes the pipe
        let _ = stdin.write_all(input.as_bytes()).await;
    }

    let _ = child.wait().await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn install(dir: &Path, program: &str) -> PathBuf {
        install_script(dir, program, "cat")
    }

    fn install_script(dir: &Path, program: &str, body: &str) -> PathBuf {
        let path = dir.join(program);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn path_of(dirs: &[&Path]) -> OsString {
        std::env::join_paths(dirs).unwrap()
    }

    #[test]
    fn test_preference_order() {
        let names: Vec<&str> = RENDERERS.iter().map(|r| r.program).collect();
        assert_eq!(names, vec!["glow", "mdcat", "bat"]);
    }

    #[test]
    fn test_find_on_path() {
        let dir = TempDir::new().unwrap();
        let bin = install(dir.path(), "mdcat");
        let path = path_of(&[dir.path()]);

        assert_eq!(find_on_path("mdcat", &path), Some(bin));
        assert_eq!(find_on_path("glow", &path), None);
    }

    #[test]
    fn test_select_prefers_earlier_renderer() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        install(first.path(), "bat");
        let glow = install(second.path(), "glow");

        let path = path_of(&[first.path(), second.path()]);
        let (renderer, bin) = select_renderer(Some(&path)).unwrap();

        assert_eq!(renderer.program, "glow");
        assert_eq!(bin, glow);
    }

    #[test]
    fn test_select_none_installed() {
        let empty = TempDir::new().unwrap();
        let path = path_of(&[empty.path()]);
        assert!(select_renderer(Some(&path)).is_none());
        assert!(select_renderer(None).is_none());
    }

    #[test]
    fn test_directory_named_like_renderer_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("glow")).unwrap();
        let path = path_of(&[dir.path()]);
        assert!(find_on_path("glow", &path).is_none());
    }

    #[tokio::test]
    async fn test_pipe_through_success() {
        assert!(pipe_through(Path::new("cat"), &[], "# Title\n").await);
    }

    #[tokio::test]
    async fn test_pipe_through_missing_binary() {
        assert!(!pipe_through(Path::new("/nonexistent/glow"), &[], "# Title\n").await);
    }

    #[tokio::test]
    async fn test_renderer_failing_midway_is_not_followed_by_plain_text() {
        let dir = TempDir::new().unwrap();
        let bin = install_script(dir.path(), "glow", "head -c 3\nexit 1");

        assert!(pipe_through(&bin, &[], "# Title\n\nBody\n").await);
        assert!(pipe_through(Path::new("false"), &[], "# Title\n").await);
    }

    #[tokio::test]
    async fn test_present_without_rendering_is_plain() {
        assert_eq!(present("# Review\n", false).await, Presented::Plain);
    }
}
