//! Regression baseline operations: drift checks and baseline writes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::snapshot::{
    BehaviorSnapshot, RegressionDrift, build_behavior_snapshot, compare_behavior_snapshot,
};
use crate::failure::Failure;
use crate::io::baseline::{
    RegressionBaseline, default_baseline_path, read_regression_baseline,
    write_regression_baseline,
};
use crate::io::paths::LoopPaths;
use crate::io::run_store::{load_run, load_run_by_ref};

/// Outcome of a drift check against a stored baseline.
#[derive(Debug)]
pub struct RegressionCheck {
    pub baseline_path: PathBuf,
    pub drifts: Vec<RegressionDrift>,
    pub fingerprint: String,
}

/// Compare the referenced run (default: latest summary) against the stored
/// baseline for a profile.
#[instrument(skip_all, fields(profile = %profile))]
pub fn check_regression(
    repo_root: &Path,
    profile: &str,
    baseline_path: Option<&Path>,
    run_ref: Option<&str>,
) -> Result<RegressionCheck> {
    let baseline_path = resolve_baseline_path(repo_root, profile, baseline_path);
    let baseline = read_regression_baseline(&baseline_path, profile)?;
    let snapshot = load_snapshot(repo_root, run_ref)?;

    let drifts = compare_behavior_snapshot(&baseline.snapshot, &snapshot);
    info!(
        drifts = drifts.len(),
        fingerprint = %snapshot.fingerprint(),
        "regression check complete"
    );
    Ok(RegressionCheck {
        baseline_path,
        fingerprint: snapshot.fingerprint(),
        drifts,
    })
}

/// Snapshot the referenced run (default: latest summary) and store it as the
/// baseline for a profile.
#[instrument(skip_all, fields(profile = %profile))]
pub fn write_baseline(
    repo_root: &Path,
    profile: &str,
    baseline_path: Option<&Path>,
    run_ref: Option<&str>,
) -> Result<(PathBuf, RegressionBaseline)> {
    let baseline_path = resolve_baseline_path(repo_root, profile, baseline_path);
    let snapshot = load_snapshot(repo_root, run_ref)?;
    let baseline = RegressionBaseline::new(profile, snapshot);
    write_regression_baseline(&baseline_path, &baseline)?;
    info!(path = %baseline_path.display(), "baseline written");
    Ok((baseline_path, baseline))
}

fn resolve_baseline_path(
    repo_root: &Path,
    profile: &str,
    explicit: Option<&Path>,
) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => default_baseline_path(repo_root, profile),
    }
}

fn load_snapshot(repo_root: &Path, run_ref: Option<&str>) -> Result<BehaviorSnapshot> {
    let result = match run_ref {
        Some(run_ref) => load_run_by_ref(repo_root, run_ref)?,
        None => {
            let latest = LoopPaths::new(repo_root).latest_summary_path;
            if !latest.is_file() {
                return Err(Failure::usage(format!(
                    "no run to snapshot: {} not found",
                    latest.display()
                ))
                .with_hint("run `verifier run` first, or pass --run <ref>")
                .into());
            }
            load_run(&latest)?
        }
    };
    Ok(build_behavior_snapshot(&result))
}
