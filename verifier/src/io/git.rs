//! Minimal git adapter for branch stamping and auto-commit.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Return the current branch name, or `None` outside a repository or on a
    /// detached HEAD. Branch stamping is informational, so this never errors.
    pub fn current_branch(&self) -> Option<String> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).ok()?;
        if !out.status.success() {
            return None;
        }
        let name = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if name.is_empty() || name == "HEAD" {
            return None;
        }
        Some(name)
    }

    /// Stage all changes.
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])
    }

    /// Commit staged changes. Returns false when there was nothing to commit.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        let staged = self.run(&["diff", "--cached", "--quiet"])?;
        if staged.status.success() {
            debug!("nothing staged to commit");
            return Ok(false);
        }
        self.run_checked(&["commit", "-m", message])?;
        debug!(message, "committed staged changes");
        Ok(true)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("run git {args:?}"))
    }

    fn run_checked(&self, args: &[&str]) -> Result<()> {
        let out = self.run(args)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(anyhow!("git {args:?} failed: {}", stderr.trim()));
        }
        Ok(())
    }
}
