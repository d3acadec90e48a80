//! Runner configuration
//!
//! Environment overrides are read exactly once at process start into a
//! `RunnerConfig`, which is then passed by reference to the runner and the
//! agent invoker. Nothing downstream reads the environment.

use std::path::PathBuf;

/// Environment variable overriding the agent executable.
pub const ENV_CLAUDE_BIN: &str = "BATON_CLAUDE_BIN";
/// Environment variable overriding the model identifier.
pub const ENV_MODEL: &str = "BATON_MODEL";
/// Environment variable that keeps the scratch directory after the run.
pub const ENV_KEEP_WORK_DIR: &str = "BATON_KEEP_WORK_DIR";
/// Environment variable overriding where scratch directories are created.
pub const ENV_WORK_ROOT: &str = "BATON_WORK_ROOT";

const DEFAULT_CLAUDE_BIN: &str = "claude";
const DEFAULT_MODEL: &str = "sonnet";

/// Process-wide settings shared by every step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Agent executable (name on `PATH` or absolute path)
    pub agent_binary: String,
    /// Model identifier passed as `--model`
    pub model: String,
    /// Keep the scratch directory instead of deleting it
    pub keep_work_dir: bool,
    /// Base directory for scratch directories and the run log
    pub work_root: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            agent_binary: DEFAULT_CLAUDE_BIN.to_string(),
            model: DEFAULT_MODEL.to_string(),
            keep_work_dir: false,
            work_root: default_work_root(),
        }
    }
}

impl RunnerConfig {
    /// Build the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            agent_binary: get(ENV_CLAUDE_BIN).unwrap_or(defaults.agent_binary),
            model: get(ENV_MODEL).unwrap_or(defaults.model),
            keep_work_dir: get(ENV_KEEP_WORK_DIR).is_some_and(|v| is_truthy(&v)),
            work_root: get(ENV_WORK_ROOT).map_or(defaults.work_root, PathBuf::from),
        }
    }
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("baton")
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = RunnerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.agent_binary, "claude");
        assert_eq!(config.model, "sonnet");
        assert!(!config.keep_work_dir);
        assert!(config.work_root.ends_with("baton"));
    }

    #[test]
    fn test_overrides_applied() {
        let config = RunnerConfig::from_lookup(lookup(&[
            (ENV_CLAUDE_BIN, "/opt/claude/bin/claude"),
            (ENV_MODEL, "opus"),
            (ENV_KEEP_WORK_DIR, "1"),
            (ENV_WORK_ROOT, "/var/tmp/runs"),
        ]));
        assert_eq!(config.agent_binary, "/opt/claude/bin/claude");
        assert_eq!(config.model, "opus");
        assert!(config.keep_work_dir);
        assert_eq!(config.work_root, PathBuf::from("/var/tmp/runs"));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = RunnerConfig::from_lookup(lookup(&[(ENV_CLAUDE_BIN, ""), (ENV_MODEL, "  ")]));
        assert_eq!(config.agent_binary, "claude");
        assert_eq!(config.model, "sonnet");
    }

    #[test]
    fn test_keep_work_dir_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            let config = RunnerConfig::from_lookup(lookup(&[(ENV_KEEP_WORK_DIR, value)]));
            assert!(config.keep_work_dir, "{value} should enable retention");
        }
        for value in ["0", "false", "no", "off", "maybe"] {
            let config = RunnerConfig::from_lookup(lookup(&[(ENV_KEEP_WORK_DIR, value)]));
            assert!(!config.keep_work_dir, "{value} should not enable retention");
        }
    }
}
