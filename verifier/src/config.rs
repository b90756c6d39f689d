//! Run configuration supplied by the caller.

use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::core::judge::SCORE_MAX;
use crate::core::types::Mode;

/// Configuration for one loop invocation.
///
/// Caller-owned and read-only to the loop; immutable for the duration of a
/// run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repo_root: PathBuf,
    /// Pass threshold on the 0-10 score scale.
    pub threshold: f64,
    /// Iteration budget (>= 1).
    pub max_iterations: u32,
    pub mode: Mode,
    /// Optional JSON role configuration; absent means all roles builtin.
    pub role_config_path: Option<PathBuf>,
    /// Informational branch name; resolved from git when empty.
    pub branch: String,
    pub auto_fix: bool,
    /// Commit the worktree after iterations that applied fixes.
    pub auto_commit: bool,
    /// Bounds fix attempts recorded per iteration; 0 means unbounded.
    pub budget: u32,
    /// Passed through to external roles for reproducible randomness.
    pub seed: i64,
    /// Write per-iteration scenario dumps in addition to role artifacts.
    pub verbose_artifacts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            threshold: 9.0,
            max_iterations: 3,
            mode: Mode::Classic,
            role_config_path: None,
            branch: String::new(),
            auto_fix: false,
            auto_commit: false,
            budget: 0,
            seed: 0,
            verbose_artifacts: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be >= 1"));
        }
        if !(0.0..=SCORE_MAX).contains(&self.threshold) {
            return Err(anyhow!("threshold must be within [0, {SCORE_MAX}]"));
        }
        if self.repo_root.as_os_str().is_empty() {
            return Err(anyhow!("repo_root must be non-empty"));
        }
        Ok(())
    }
}
