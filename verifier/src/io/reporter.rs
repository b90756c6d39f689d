//! Report persistence: latest summary, maintainer review, retention sweep.
//!
//! The reporter is the only component permitted to delete run directories.
//! Only one loop/report-writing process may target a given repo root at a
//! time; the retention sweep is not safe against concurrent writers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::types::RunResult;
use crate::io::paths::LoopPaths;
use crate::io::run_store::write_json;

pub const DEFAULT_RUN_RETENTION: usize = 20;
/// Findings listed in the review before collapsing into an overflow count.
const REVIEW_FINDING_LIMIT: usize = 10;

const REVIEW_TEMPLATE: &str = include_str!("templates/review.md");

/// Persist the latest-summary and maintainer review, then sweep old runs.
#[instrument(skip_all, fields(run_id = %result.run_id))]
pub fn write_reports(repo_root: &Path, result: &RunResult) -> Result<()> {
    let paths = LoopPaths::new(repo_root);
    fs::create_dir_all(&paths.artifacts_dir)
        .with_context(|| format!("create {}", paths.artifacts_dir.display()))?;

    write_json(&paths.latest_summary_path, result)?;
    write_review(&paths, result)?;
    cleanup_run_artifacts(&paths, DEFAULT_RUN_RETENTION)?;
    Ok(())
}

/// Finding row passed to the review template.
#[derive(Debug, Serialize)]
struct ReviewFinding<'a> {
    code: &'a str,
    message: &'a str,
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewCommittee {
    planner_score: String,
    fixer_score: String,
    judger_score: String,
}

fn write_review(paths: &LoopPaths, result: &RunResult) -> Result<()> {
    let mut env = Environment::new();
    env.add_template("review", REVIEW_TEMPLATE)
        .context("review template should be valid")?;
    let template = env.get_template("review")?;

    let findings: Vec<ReviewFinding<'_>> = result
        .findings
        .iter()
        .take(REVIEW_FINDING_LIMIT)
        .map(|f| ReviewFinding {
            code: &f.code,
            message: &f.message,
            source: &f.source,
        })
        .collect();
    let overflow = result.findings.len().saturating_sub(REVIEW_FINDING_LIMIT);

    let committee = result.committee.as_ref().map(|_| ReviewCommittee {
        planner_score: format!("{:.2}", result.judge.planner_score),
        fixer_score: format!("{:.2}", result.judge.fixer_score),
        judger_score: format!("{:.2}", result.judge.judger_score),
    });

    let rendered = template.render(context! {
        run_id => &result.run_id,
        mode => result.mode.as_str(),
        score => format!("{:.2}", result.judge.score),
        threshold => format!("{:.2}", result.judge.threshold),
        pass => result.judge.pass,
        iterations => result.iterations,
        branch => &result.branch,
        findings => findings,
        overflow => overflow,
        committee => committee,
    })?;

    if let Some(parent) = paths.review_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&paths.review_path, rendered)
        .with_context(|| format!("write {}", paths.review_path.display()))?;
    Ok(())
}

/// Keep the newest `keep` run directories (lexical order equals creation
/// order because run ids are time-derived); delete older ones wholesale.
fn cleanup_run_artifacts(paths: &LoopPaths, keep: usize) -> Result<()> {
    let entries = match fs::read_dir(&paths.runs_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", paths.runs_dir.display()));
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.context("read runs entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();
    if dirs.len() <= keep {
        return Ok(());
    }

    let excess = dirs.len() - keep;
    for old in &dirs[..excess] {
        let path = paths.runs_dir.join(old);
        fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))?;
        debug!(run = %old, "removed old run directory");
    }
    Ok(())
}
