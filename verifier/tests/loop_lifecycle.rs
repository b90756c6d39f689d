//! Loop-level tests for full verification lifecycle scenarios.
//!
//! These tests drive `run_loop` end-to-end: loop execution, report
//! persistence, retention, run comparison, and regression baselines.

use std::fs;
use std::path::Path;

use chrono::Utc;

use verifier::compare::compare_runs;
use verifier::config::Config;
use verifier::core::types::{JudgeScore, Mode, RunResult};
use verifier::failure::{EXIT_CONTRACT_VALIDATION, EXIT_EXECUTION, exit_code_for};
use verifier::io::paths::LoopPaths;
use verifier::io::reporter::write_reports;
use verifier::io::roles::{ConfiguredRoles, RoleConfig, RoleSpec};
use verifier::io::run_store::write_json;
use verifier::looping::run_loop;
use verifier::regression::{check_regression, write_baseline};
use verifier::test_support::{
    ScriptedDetector, ScriptedRoles, ScriptedScenario, finding, ready_repo,
};

fn committee_config(root: &Path) -> Config {
    Config {
        repo_root: root.to_path_buf(),
        mode: Mode::Committee,
        auto_fix: true,
        max_iterations: 3,
        threshold: 9.0,
        ..Config::default()
    }
}

/// Full lifecycle: a committee run that converges in three iterations, gets
/// reported, and becomes a regression baseline that a changed run drifts from.
#[test]
fn committee_lifecycle_report_and_regression() {
    let temp = ready_repo();
    let cfg = committee_config(temp.path());

    let scenario = ScriptedScenario::always_ok("probe");
    // Pre/post detections per iteration: 3,2 then 2,1 then 1,0 findings.
    let detector = ScriptedDetector::queued(vec![
        vec![
            finding("a", "scenario"),
            finding("b", "scenario"),
            finding("c", "scenario"),
        ],
        vec![finding("b", "scenario"), finding("c", "scenario")],
        vec![finding("b", "scenario"), finding("c", "scenario")],
        vec![finding("c", "scenario")],
        vec![finding("c", "scenario")],
        vec![],
    ]);
    let roles = ScriptedRoles::fixing_one_per_call();

    let result = run_loop(&cfg, &scenario, &detector, &roles).expect("loop");
    assert_eq!(result.iterations, 3);
    assert_eq!(result.fixes_applied.len(), 3);
    assert!(result.judge.pass);

    // Reports land under .verifier/ with the run's artifacts.
    write_reports(temp.path(), &result).expect("reports");
    let paths = LoopPaths::new(temp.path());
    assert!(paths.latest_summary_path.is_file());
    assert!(paths.final_report_path(&result.run_id).is_file());
    assert!(paths.iter_dir(&result.run_id, 3).join("judger-output.json").is_file());
    let review = fs::read_to_string(&paths.review_path).expect("review");
    assert!(review.contains(&result.run_id));
    assert!(review.contains("## Committee"));

    // The latest summary seeds a baseline; the same run checks clean.
    write_baseline(temp.path(), "committee", None, None).expect("write baseline");
    let check = check_regression(temp.path(), "committee", None, None).expect("check");
    assert!(check.drifts.is_empty());

    // A behaviorally different run drifts.
    let mut changed = result.clone();
    changed.judge = JudgeScore {
        score: 7.5,
        threshold: 9.0,
        pass: false,
        ..result.judge.clone()
    };
    changed.findings.push(finding("new_problem", "scenario"));
    let changed_path = temp.path().join("changed-report.json");
    write_json(&changed_path, &changed).expect("write changed");

    let check = check_regression(
        temp.path(),
        "committee",
        None,
        Some(changed_path.to_str().expect("utf8")),
    )
    .expect("check changed");
    assert!(!check.drifts.is_empty());
}

/// External roles speak the JSON contract: context file in, JSON stdout out.
#[test]
fn committee_with_external_roles_round_trips_contract() {
    let temp = ready_repo();
    let cfg = Config {
        auto_fix: false,
        ..committee_config(temp.path())
    };

    let planner = temp.path().join("planner.sh");
    fs::write(
        &planner,
        "#!/bin/sh\n\
         # context json arrives as $1\n\
         test -f \"$1\" || exit 1\n\
         echo '{\"schema_version\":\"v1\",\"summary\":\"external plan\",\"fix_targets\":[\"a\"]}'\n",
    )
    .expect("planner script");
    let judger = temp.path().join("judger.sh");
    fs::write(
        &judger,
        "#!/bin/sh\n\
         echo '{\"schema_version\":\"v1\",\"extra_findings\":[{\"code\":\"style\",\"message\":\"style drift\",\"source\":\"judger\"}],\"notes\":\"looked closer\"}'\n",
    )
    .expect("judger script");

    let role_config = RoleConfig {
        planner: RoleSpec {
            strategy: None,
            command: Some(format!("sh {}", planner.display())),
        },
        fixer: RoleSpec::default(),
        judger: RoleSpec {
            strategy: Some("strict".to_string()),
            command: Some(format!("sh {}", judger.display())),
        },
    };
    let roles = ConfiguredRoles::new(&role_config);
    let scenario = ScriptedScenario::always_ok("probe");
    let detector = ScriptedDetector::constant(Vec::new());

    let result = run_loop(&cfg, &scenario, &detector, &roles).expect("loop");
    let meta = result.committee.as_ref().expect("committee meta");
    assert_eq!(meta.planner.strategy, "external");
    assert_eq!(meta.fixer.strategy, "builtin");
    // Explicit labels win over command-derived resolution, but the command
    // still ran: the judger's extra finding is in the combined list.
    assert_eq!(meta.judger.strategy, "strict");
    assert!(meta.judger.independent);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].code, "style");
    assert_eq!(result.findings[0].source, "judger");
}

/// A broken external role aborts the run with an execution-class failure.
#[test]
fn external_role_garbage_output_fails_execution() {
    let temp = ready_repo();
    let cfg = Config {
        auto_fix: false,
        ..committee_config(temp.path())
    };

    let planner = temp.path().join("planner.sh");
    fs::write(&planner, "#!/bin/sh\necho 'not json at all'\n").expect("planner script");
    let role_config = RoleConfig {
        planner: RoleSpec {
            strategy: None,
            command: Some(format!("sh {}", planner.display())),
        },
        ..RoleConfig::default()
    };
    let roles = ConfiguredRoles::new(&role_config);
    let scenario = ScriptedScenario::always_ok("probe");
    let detector = ScriptedDetector::constant(Vec::new());

    let err = run_loop(&cfg, &scenario, &detector, &roles).expect_err("garbage output");
    assert_eq!(exit_code_for(&err), EXIT_EXECUTION);

    // The partial final report is still on disk for postmortem inspection.
    let runs_dir = LoopPaths::new(temp.path()).runs_dir;
    let run_dirs: Vec<_> = fs::read_dir(&runs_dir)
        .expect("runs dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(run_dirs.len(), 1);
    assert!(run_dirs[0].join("final-report.json").is_file());
}

/// Classic mode without autofix reports the failing state as-is in one pass.
#[test]
fn classic_single_pass_reports_failure() {
    let temp = ready_repo();
    let cfg = Config {
        repo_root: temp.path().to_path_buf(),
        mode: Mode::Classic,
        auto_fix: false,
        max_iterations: 5,
        ..Config::default()
    };
    let scenario = ScriptedScenario::always_ok("probe");
    let detector = ScriptedDetector::constant(vec![finding("x", "scenario")]);
    let roles = ScriptedRoles::all_quiet();

    let result = run_loop(&cfg, &scenario, &detector, &roles).expect("loop");
    assert_eq!(result.iterations, 1);
    assert!(!result.judge.pass);
    assert!(result.committee.is_none());
}

/// Retention: 25 sequential runs leave exactly 20 directories, oldest gone.
#[test]
fn retention_keeps_twenty_newest_runs() {
    let temp = ready_repo();
    let paths = LoopPaths::new(temp.path());

    for i in 1..=25 {
        let run_id = format!("20260101-{i:06}");
        let mut result = RunResult::new(&run_id, Mode::Classic, "main", Utc::now());
        result.iterations = 1;
        write_json(&paths.final_report_path(&run_id), &result).expect("report");
        write_reports(temp.path(), &result).expect("reports");
    }

    let mut remaining: Vec<String> = fs::read_dir(&paths.runs_dir)
        .expect("runs dir")
        .map(|e| {
            e.expect("entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    remaining.sort();
    assert_eq!(remaining.len(), 20);
    assert_eq!(remaining[0], "20260101-000006");
    assert_eq!(remaining[19], "20260101-000025");
}

/// Comparator sign convention: passing B against failing A is positive.
#[test]
fn compare_runs_signs_regression_vs_improvement() {
    let temp = ready_repo();
    let paths = LoopPaths::new(temp.path());

    let mut run_a = RunResult::new("a", Mode::Classic, "main", Utc::now());
    run_a.iterations = 1;
    run_a.judge = JudgeScore {
        score: 8.5,
        threshold: 9.0,
        pass: false,
        ..JudgeScore::default()
    };
    let mut run_b = RunResult::new("b", Mode::Classic, "main", Utc::now());
    run_b.iterations = 1;
    run_b.judge = JudgeScore {
        score: 9.5,
        threshold: 9.0,
        pass: true,
        ..JudgeScore::default()
    };
    write_json(&paths.final_report_path("a"), &run_a).expect("run a");
    write_json(&paths.final_report_path("b"), &run_b).expect("run b");

    let report = compare_runs(temp.path(), "a", "b").expect("compare");
    assert_eq!(report.delta.score, 1.0);
    assert_eq!(report.delta.pass_delta, 1);

    let reversed = compare_runs(temp.path(), "b", "a").expect("compare reversed");
    assert_eq!(reversed.delta.score, -1.0);
    assert_eq!(reversed.delta.pass_delta, -1);
}

/// A missing baseline never silently passes; creating one is explicit.
#[test]
fn missing_baseline_is_contract_failure_until_written() {
    let temp = ready_repo();
    let mut result = RunResult::new("r", Mode::Classic, "main", Utc::now());
    result.iterations = 1;
    let paths = LoopPaths::new(temp.path());
    write_json(&paths.latest_summary_path, &result).expect("summary");

    let err = check_regression(temp.path(), "standard", None, None).expect_err("no baseline");
    assert_eq!(exit_code_for(&err), EXIT_CONTRACT_VALIDATION);

    write_baseline(temp.path(), "standard", None, None).expect("write baseline");
    let check = check_regression(temp.path(), "standard", None, None).expect("check");
    assert!(check.drifts.is_empty());
}
