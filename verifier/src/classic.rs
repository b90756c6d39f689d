//! Classic loop: single-pass scenario verification with builtin fixes.

use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::core::judge;
use crate::core::types::{Mode, RunResult};
use crate::io::detect::FindingDetector;
use crate::io::fixes::apply_builtin_fixes;
use crate::io::paths::LoopPaths;
use crate::io::run_store::write_json;
use crate::io::scenario::ScenarioRunner;
use crate::looping::{commit_fixes, run_and_detect};

/// Run the classic loop: scenario, findings, optional builtin fixes, score.
///
/// Runs once when `auto_fix` is off; otherwise repeats up to `max_iterations`,
/// stopping as soon as the score passes or an iteration applied zero fixes
/// (no-progress termination, a normal outcome). `fixes_applied` accumulates
/// across iterations and is never cleared.
#[instrument(skip_all, fields(run_id = %run_id))]
pub fn run_classic<S, D>(
    cfg: &Config,
    scenario: &S,
    detector: &D,
    run_id: &str,
    branch: &str,
    started: DateTime<Utc>,
) -> Result<RunResult>
where
    S: ScenarioRunner,
    D: FindingDetector,
{
    let paths = LoopPaths::new(&cfg.repo_root);
    let run_dir = paths.run_dir(run_id);
    fs::create_dir_all(&run_dir).with_context(|| format!("create {}", run_dir.display()))?;

    let mut result = RunResult::new(run_id, Mode::Classic, branch, started);

    let outcome = (|| -> Result<()> {
        for iteration in 1..=cfg.max_iterations {
            let (scenario_result, findings) = run_and_detect(cfg, scenario, detector)?;

            let fixes = if cfg.auto_fix {
                apply_builtin_fixes(&cfg.repo_root, &findings, cfg.budget)?
            } else {
                Vec::new()
            };
            let fixed_this_iter = fixes.len();
            result.fixes_applied.extend(fixes);

            result.judge = judge::score(&scenario_result, &findings, cfg.threshold);
            result.scenario = scenario_result;
            result.findings = findings;
            result.iterations = iteration;
            result.finished_at = Utc::now();

            debug!(
                iteration,
                score = result.judge.score,
                fixes = fixed_this_iter,
                "classic iteration complete"
            );

            if cfg.auto_commit && fixed_this_iter > 0 {
                commit_fixes(cfg, run_id, iteration, fixed_this_iter)?;
            }

            if result.judge.pass || !cfg.auto_fix || fixed_this_iter == 0 {
                if fixed_this_iter == 0 && !result.judge.pass && cfg.auto_fix {
                    info!(iteration, "no applicable fixes, stopping");
                }
                break;
            }
        }
        Ok(())
    })();

    // Keep `iterations` meaningful for callers even when the body never ran.
    if result.iterations == 0 {
        result.iterations = 1;
        result.finished_at = Utc::now();
    }
    write_json(&paths.final_report_path(run_id), &result)?;
    outcome?;
    Ok(result)
}
