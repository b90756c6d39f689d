//! Loop entry point: run id allocation, mode dispatch, shared helpers.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, instrument};

use crate::classic::run_classic;
use crate::committee::run_committee;
use crate::config::Config;
use crate::core::types::{Finding, Mode, RunResult, ScenarioResult};
use crate::failure::Failure;
use crate::io::detect::{FindingDetector, check_repo_readiness};
use crate::io::git::Git;
use crate::io::roles::RoleExecutor;
use crate::io::scenario::ScenarioRunner;

/// Allocate a fresh run id. Time-derived and lexically sortable, so the
/// retention sweep's lexical order equals creation order.
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Run one loop invocation to completion and return its result.
///
/// The caller owns `cfg`; the returned result is owned by this invocation and
/// never mutated afterwards. Runs single-threaded and sequentially; callers
/// wrap their own timeout/cancellation around the whole invocation.
#[instrument(skip_all, fields(mode = cfg.mode.as_str()))]
pub fn run_loop<S, D, R>(cfg: &Config, scenario: &S, detector: &D, roles: &R) -> Result<RunResult>
where
    S: ScenarioRunner,
    D: FindingDetector,
    R: RoleExecutor,
{
    if let Err(err) = cfg.validate() {
        return Err(Failure::usage(err.to_string()).into());
    }

    let run_id = new_run_id();
    let branch = resolve_branch(cfg);
    let started = Utc::now();
    info!(run_id = %run_id, branch = %branch, "loop started");

    let result = match cfg.mode {
        Mode::Classic => run_classic(cfg, scenario, detector, &run_id, &branch, started),
        Mode::Committee => run_committee(cfg, scenario, detector, roles, &run_id, &branch, started),
    }?;

    info!(
        run_id = %result.run_id,
        score = result.judge.score,
        pass = result.judge.pass,
        iterations = result.iterations,
        "loop finished"
    );
    Ok(result)
}

/// Run the scenario and detect findings, appending the repo readiness check.
pub(crate) fn run_and_detect<S, D>(
    cfg: &Config,
    scenario: &S,
    detector: &D,
) -> Result<(ScenarioResult, Vec<Finding>)>
where
    S: ScenarioRunner,
    D: FindingDetector,
{
    let result = scenario
        .run()
        .context(Failure::execution("scenario execution failed"))?;
    let mut findings = detector
        .detect(&result)
        .context(Failure::execution("finding detection failed"))?;
    findings.extend(check_repo_readiness(&cfg.repo_root));
    Ok((result, findings))
}

fn resolve_branch(cfg: &Config) -> String {
    if !cfg.branch.trim().is_empty() {
        return cfg.branch.trim().to_string();
    }
    Git::new(&cfg.repo_root)
        .current_branch()
        .unwrap_or_else(|| "unknown".to_string())
}

/// Commit the worktree after an iteration that applied fixes.
pub(crate) fn commit_fixes(cfg: &Config, run_id: &str, iteration: u32, fixes: usize) -> Result<()> {
    let git = Git::new(&cfg.repo_root);
    git.add_all().context(Failure::execution("stage fixes"))?;
    let message = format!("chore(loop): run {run_id} iter {iteration} fixes={fixes}");
    git.commit_staged(&message)
        .context(Failure::execution("commit fixes"))?;
    Ok(())
}
