//! Finding detection over scenario results and repository state.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::core::types::{Finding, ScenarioResult};

pub const SOURCE_SCENARIO: &str = "scenario";
pub const SOURCE_READINESS: &str = "readiness";

pub const CODE_STEP_FAILED: &str = "scenario_step_failed";
pub const CODE_README_MISSING: &str = "readme_missing";
pub const CODE_ARTIFACTS_UNIGNORED: &str = "artifacts_unignored";
pub const CODE_RUNS_DIR_MISSING: &str = "runs_dir_missing";

/// Abstraction over finding detection backends.
///
/// Pure function of the scenario result; repository readiness is a separate
/// check the loop appends to the returned list.
pub trait FindingDetector {
    fn detect(&self, scenario: &ScenarioResult) -> Result<Vec<Finding>>;
}

/// Default detector: one finding per failed scenario step.
#[derive(Debug, Clone, Default)]
pub struct StepFailureDetector;

impl FindingDetector for StepFailureDetector {
    fn detect(&self, scenario: &ScenarioResult) -> Result<Vec<Finding>> {
        let findings: Vec<Finding> = scenario
            .steps
            .iter()
            .filter(|step| !step.ok)
            .map(|step| Finding {
                code: CODE_STEP_FAILED.to_string(),
                message: format!(
                    "step {:?} exited with {:?}",
                    step.command, step.exit_code
                ),
                source: SOURCE_SCENARIO.to_string(),
            })
            .collect();
        debug!(count = findings.len(), "detected scenario findings");
        Ok(findings)
    }
}

/// Check whether the repository is ready to host loop artifacts.
///
/// Appended to every detection pass; each probe emits at most one finding.
pub fn check_repo_readiness(repo_root: &Path) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !repo_root.join("README.md").exists() {
        findings.push(readiness_finding(
            CODE_README_MISSING,
            "README.md not found at the repo root",
        ));
    }

    if !gitignore_covers_artifacts(repo_root) {
        findings.push(readiness_finding(
            CODE_ARTIFACTS_UNIGNORED,
            ".gitignore does not ignore .verifier/",
        ));
    }

    if !repo_root.join(".verifier").join("runs").is_dir() {
        findings.push(readiness_finding(
            CODE_RUNS_DIR_MISSING,
            ".verifier/runs directory not found",
        ));
    }

    findings
}

fn gitignore_covers_artifacts(repo_root: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(repo_root.join(".gitignore")) else {
        return false;
    };
    contents.lines().any(|line| line.trim() == ".verifier/")
}

fn readiness_finding(code: &str, message: &str) -> Finding {
    Finding {
        code: code.to_string(),
        message: message.to_string(),
        source: SOURCE_READINESS.to_string(),
    }
}
