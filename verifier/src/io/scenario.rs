//! Scenario execution against the target project.
//!
//! The [`ScenarioRunner`] trait decouples the loop from the actual scenario
//! backend. Tests use scripted runners that return predetermined results
//! without spawning processes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

use crate::core::types::{ScenarioResult, ScenarioStep};
use crate::io::process::run_command_with_timeout;

/// Abstraction over scenario execution backends.
///
/// Implementations must be safely callable twice in a row within one
/// iteration (pre-fix and post-fix) with no reset step.
pub trait ScenarioRunner {
    fn run(&self) -> Result<ScenarioResult>;
}

/// Fixed, ordered command sequence exercised against the scaffolded project.
#[derive(Debug, Clone)]
pub struct ScenarioDescriptor {
    pub name: String,
    /// Shell command lines, run sequentially in the repo root.
    pub commands: Vec<String>,
    pub step_timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ScenarioDescriptor {
    /// Default probe: worktree status plus a project self-check.
    pub fn default_probe(check_command: Option<&str>) -> Self {
        let check = check_command.unwrap_or("test -f README.md");
        Self {
            name: "project-probe".to_string(),
            commands: vec!["git status --porcelain".to_string(), check.to_string()],
            step_timeout: Duration::from_secs(60),
            output_limit_bytes: 50_000,
        }
    }
}

/// Scenario runner that executes the descriptor's commands via `sh -c`.
#[derive(Debug, Clone)]
pub struct CommandScenario {
    repo_root: PathBuf,
    descriptor: ScenarioDescriptor,
}

impl CommandScenario {
    pub fn new(repo_root: &Path, descriptor: ScenarioDescriptor) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            descriptor,
        }
    }
}

impl ScenarioRunner for CommandScenario {
    #[instrument(skip_all, fields(scenario = %self.descriptor.name))]
    fn run(&self) -> Result<ScenarioResult> {
        if self.descriptor.commands.is_empty() {
            bail!("scenario {} has no commands", self.descriptor.name);
        }
        let mut steps = Vec::with_capacity(self.descriptor.commands.len());
        for line in &self.descriptor.commands {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", line]).current_dir(&self.repo_root);
            let output = run_command_with_timeout(
                cmd,
                None,
                self.descriptor.step_timeout,
                self.descriptor.output_limit_bytes,
            )
            .with_context(|| format!("run scenario step {line:?}"))?;

            let ok = !output.timed_out && output.status.success();
            debug!(command = %line, ok, exit_code = ?output.status.code(), "scenario step");
            steps.push(ScenarioStep {
                command: line.clone(),
                ok,
                exit_code: output.status.code(),
            });
        }

        let ok = steps.iter().all(|step| step.ok);
        Ok(ScenarioResult {
            name: self.descriptor.name.clone(),
            ok,
            steps,
        })
    }
}
