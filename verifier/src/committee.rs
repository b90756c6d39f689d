//! Committee loop: planner proposes, fixer applies, judger reviews.

use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::core::judge;
use crate::core::types::{CommitteeMeta, Mode, RoleExecution, RunResult};
use crate::io::detect::FindingDetector;
use crate::io::paths::LoopPaths;
use crate::io::roles::{Role, RoleContext, RoleExecutor, write_role_context};
use crate::io::run_store::write_json;
use crate::io::scenario::ScenarioRunner;
use crate::looping::{commit_fixes, run_and_detect};

/// Run the committee loop.
///
/// Each iteration is strictly ordered: pre-fix scenario and findings, planner,
/// fixer, a second independent scenario run, judger, combined scoring. The
/// result is updated and the final report rewritten after every iteration, so
/// a crash mid-loop leaves the most recent iteration externally observable.
/// A fatal role or scenario error aborts the run; artifacts from completed
/// iterations stay on disk for postmortem inspection.
#[instrument(skip_all, fields(run_id = %run_id))]
pub fn run_committee<S, D, R>(
    cfg: &Config,
    scenario: &S,
    detector: &D,
    roles: &R,
    run_id: &str,
    branch: &str,
    started: DateTime<Utc>,
) -> Result<RunResult>
where
    S: ScenarioRunner,
    D: FindingDetector,
    R: RoleExecutor,
{
    let paths = LoopPaths::new(&cfg.repo_root);
    let run_dir = paths.run_dir(run_id);
    fs::create_dir_all(&run_dir).with_context(|| format!("create {}", run_dir.display()))?;

    let mut result = RunResult::new(run_id, Mode::Committee, branch, started);
    // Strategy labels are descriptive metadata, computed the same way whether
    // or not execution succeeds.
    result.committee = Some(CommitteeMeta {
        planner: RoleExecution {
            strategy: roles.strategy_label(Role::Planner),
            independent: false,
        },
        fixer: RoleExecution {
            strategy: roles.strategy_label(Role::Fixer),
            independent: false,
        },
        judger: RoleExecution {
            strategy: roles.strategy_label(Role::Judger),
            independent: true,
        },
    });

    let outcome = run_iterations(cfg, scenario, detector, roles, run_id, &paths, &mut result);

    if result.iterations == 0 {
        result.iterations = 1;
        result.finished_at = Utc::now();
    }
    write_json(&paths.final_report_path(run_id), &result)?;
    outcome?;
    Ok(result)
}

fn run_iterations<S, D, R>(
    cfg: &Config,
    scenario: &S,
    detector: &D,
    roles: &R,
    run_id: &str,
    paths: &LoopPaths,
    result: &mut RunResult,
) -> Result<()>
where
    S: ScenarioRunner,
    D: FindingDetector,
    R: RoleExecutor,
{
    for iteration in 1..=cfg.max_iterations {
        let iter_dir = paths.iter_dir(run_id, iteration);
        fs::create_dir_all(&iter_dir)
            .with_context(|| format!("create iteration dir {}", iter_dir.display()))?;

        let (pre_scenario, pre_findings) = run_and_detect(cfg, scenario, detector)?;
        if cfg.verbose_artifacts {
            write_json(&iter_dir.join("scenario-pre.json"), &pre_scenario)?;
        }

        let ctx = RoleContext {
            run_id: run_id.to_string(),
            mode: cfg.mode,
            iteration,
            threshold: cfg.threshold,
            budget: cfg.budget,
            seed: cfg.seed,
            scenario: pre_scenario,
            findings: pre_findings,
            fixes_so_far: result.fixes_applied.clone(),
            repo_root: cfg.repo_root.clone(),
            artifact_dir: iter_dir.clone(),
            plan: None,
        };
        write_role_context(Role::Planner, &ctx)?;

        let plan = roles.run_planner(&ctx)?;
        write_json(&iter_dir.join("planner-output.json"), &plan)?;
        debug!(iteration, targets = plan.fix_targets.len(), "planner complete");

        let mut fixer_ctx = ctx.clone();
        fixer_ctx.plan = Some(plan);
        write_role_context(Role::Fixer, &fixer_ctx)?;

        let fixer_out = roles.run_fixer(&fixer_ctx)?;
        write_json(&iter_dir.join("fixer-output.json"), &fixer_out)?;
        let mut fixes = fixer_out.applied;
        if cfg.budget > 0 && fixes.len() > cfg.budget as usize {
            warn!(
                budget = cfg.budget,
                reported = fixes.len(),
                "fixer exceeded budget, truncating"
            );
            fixes.truncate(cfg.budget as usize);
        }
        let fixed_this_iter = fixes.len();
        result.fixes_applied.extend(fixes);

        // Second, independent scenario execution; the judger must never see
        // the pre-fix scenario or findings.
        let (post_scenario, post_findings) = run_and_detect(cfg, scenario, detector)?;
        if cfg.verbose_artifacts {
            write_json(&iter_dir.join("scenario-post.json"), &post_scenario)?;
        }

        let mut judger_ctx = ctx.clone();
        judger_ctx.scenario = post_scenario.clone();
        judger_ctx.findings = post_findings.clone();
        write_role_context(Role::Judger, &judger_ctx)?;

        let judger_out = roles.run_judger(&judger_ctx)?;
        write_json(&iter_dir.join("judger-output.json"), &judger_out)?;

        // Detector findings first, judger additions appended; additive, no
        // dedup against pre-fix findings sharing a code.
        let mut all_findings = post_findings;
        all_findings.extend(judger_out.extra_findings);

        result.judge = judge::score_committee(&post_scenario, &all_findings, cfg.threshold);
        result.scenario = post_scenario;
        result.findings = all_findings;
        result.iterations = iteration;
        result.finished_at = Utc::now();
        write_json(&paths.final_report_path(run_id), result)?;

        info!(
            iteration,
            score = result.judge.score,
            pass = result.judge.pass,
            fixes = fixed_this_iter,
            "committee iteration complete"
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        ScriptedDetector, ScriptedRoles, ScriptedScenario, finding, fixer_output, judger_output,
        ready_repo,
    };

    fn config(root: &std::path::Path) -> Config {
        Config {
            repo_root: root.to_path_buf(),
            mode: Mode::Committee,
            auto_fix: true,
            max_iterations: 3,
            ..Config::default()
        }
    }

    #[test]
    fn zero_fix_iteration_terminates_immediately() {
        let temp = ready_repo();
        let cfg = config(temp.path());
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(vec![finding("stubborn", "scenario")]);
        // A fixer that always reports zero applied fixes.
        let roles = ScriptedRoles::all_quiet();

        let result = run_committee(
            &cfg, &scenario, &detector, &roles, "run-1", "main", Utc::now(),
        )
        .expect("committee");
        assert_eq!(result.iterations, 1);
        assert!(!result.judge.pass);
        assert!(result.fixes_applied.is_empty());
    }

    #[test]
    fn fix_one_per_iteration_passes_at_three() {
        let temp = ready_repo();
        let cfg = config(temp.path());
        let scenario = ScriptedScenario::always_ok("probe");
        // Pre/post detections per iteration: 3,2 then 2,1 then 1,0 findings.
        let detector = ScriptedDetector::queued(vec![
            vec![finding("a", "scenario"), finding("b", "scenario"), finding("c", "scenario")],
            vec![finding("b", "scenario"), finding("c", "scenario")],
            vec![finding("b", "scenario"), finding("c", "scenario")],
            vec![finding("c", "scenario")],
            vec![finding("c", "scenario")],
            vec![],
        ]);
        let roles = ScriptedRoles::fixing_one_per_call();

        let result = run_committee(
            &cfg, &scenario, &detector, &roles, "run-2", "main", Utc::now(),
        )
        .expect("committee");
        assert_eq!(result.iterations, 3);
        assert_eq!(result.fixes_applied.len(), 3);
        assert!(result.judge.pass);
        assert_eq!(result.judge.score, 10.0);
    }

    #[test]
    fn committee_keeps_judger_findings_additive() {
        let temp = ready_repo();
        let cfg = Config {
            auto_fix: false,
            ..config(temp.path())
        };
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(vec![finding("dup", "scenario")]);
        // The judger re-reports the same code; no dedup happens.
        let roles = ScriptedRoles::all_quiet()
            .with_judger(judger_output(vec![finding("dup", "judger")]));

        let result = run_committee(
            &cfg, &scenario, &detector, &roles, "run-3", "main", Utc::now(),
        )
        .expect("committee");
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.findings[0].source, "scenario");
        assert_eq!(result.findings[1].source, "judger");
        // Deductions attribute by source.
        assert!(result.judge.fixer_score > result.judge.planner_score);
    }

    #[test]
    fn budget_truncates_reported_fixes() {
        let temp = ready_repo();
        let cfg = Config {
            budget: 1,
            ..config(temp.path())
        };
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(Vec::new());
        let roles = ScriptedRoles::all_quiet().with_fixer(fixer_output(vec![
            "fix one".to_string(),
            "fix two".to_string(),
            "fix three".to_string(),
        ]));

        let result = run_committee(
            &cfg, &scenario, &detector, &roles, "run-4", "main", Utc::now(),
        )
        .expect("committee");
        assert_eq!(result.fixes_applied, vec!["fix one"]);
    }

    #[test]
    fn role_failure_aborts_but_preserves_partial_report() {
        let temp = ready_repo();
        let cfg = config(temp.path());
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(Vec::new());
        let roles = ScriptedRoles::all_quiet().with_failing_judger("judger crashed");

        let err = run_committee(
            &cfg, &scenario, &detector, &roles, "run-5", "main", Utc::now(),
        )
        .expect_err("role failure");
        assert_eq!(
            crate::failure::exit_code_for(&err),
            crate::failure::EXIT_EXECUTION
        );

        // The partial final report and completed artifacts survive.
        let paths = LoopPaths::new(temp.path());
        assert!(paths.final_report_path("run-5").is_file());
        assert!(paths.iter_dir("run-5", 1).join("planner-output.json").is_file());
    }

    #[test]
    fn per_iteration_artifacts_include_role_io() {
        let temp = ready_repo();
        let cfg = Config {
            auto_fix: false,
            verbose_artifacts: true,
            ..config(temp.path())
        };
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(Vec::new());
        let roles = ScriptedRoles::all_quiet();

        run_committee(
            &cfg, &scenario, &detector, &roles, "run-6", "main", Utc::now(),
        )
        .expect("committee");

        let iter_dir = LoopPaths::new(temp.path()).iter_dir("run-6", 1);
        for name in [
            "planner-context.json",
            "planner-output.json",
            "fixer-context.json",
            "fixer-output.json",
            "judger-context.json",
            "judger-output.json",
            "scenario-pre.json",
            "scenario-post.json",
        ] {
            assert!(iter_dir.join(name).is_file(), "missing {name}");
        }
    }

    #[test]
    fn committee_meta_records_strategies() {
        let temp = ready_repo();
        let cfg = Config {
            auto_fix: false,
            ..config(temp.path())
        };
        let scenario = ScriptedScenario::always_ok("probe");
        let detector = ScriptedDetector::constant(Vec::new());
        let roles = ScriptedRoles::all_quiet();

        let result = run_committee(
            &cfg, &scenario, &detector, &roles, "run-7", "main", Utc::now(),
        )
        .expect("committee");
        let meta = result.committee.expect("committee meta");
        assert_eq!(meta.planner.strategy, "scripted");
        assert!(!meta.planner.independent);
        assert!(meta.judger.independent);
    }
}
