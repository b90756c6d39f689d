//! Comparison of two historical runs by reference.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::compare::{COMPARE_SCHEMA_VERSION, CompareReport, compute_delta};
use crate::io::run_store::load_run_by_ref;

/// Load two run reports and compute their delta (always B minus A).
///
/// Each reference is a literal file path or a run id under the canonical runs
/// directory; failure to resolve either is a usage-class error naming the
/// reference that failed.
#[instrument(skip_all, fields(run_a = %ref_a, run_b = %ref_b))]
pub fn compare_runs(repo_root: &Path, ref_a: &str, ref_b: &str) -> Result<CompareReport> {
    let run_a = load_run_by_ref(repo_root, ref_a)
        .with_context(|| format!("resolve run A {ref_a:?}"))?;
    let run_b = load_run_by_ref(repo_root, ref_b)
        .with_context(|| format!("resolve run B {ref_b:?}"))?;

    let delta = compute_delta(&run_a, &run_b);
    debug!(score_delta = delta.score, pass_delta = delta.pass_delta, "runs compared");
    Ok(CompareReport {
        schema_version: COMPARE_SCHEMA_VERSION.to_string(),
        run_a,
        run_b,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Finding, JudgeScore, Mode, RunResult};
    use crate::failure::{EXIT_USAGE, exit_code_for};
    use crate::io::paths::LoopPaths;
    use crate::io::run_store::write_json;
    use chrono::Utc;

    fn store_run(repo_root: &Path, run_id: &str, score: f64, pass: bool) {
        let mut result = RunResult::new(run_id, Mode::Classic, "main", Utc::now());
        result.iterations = if pass { 1 } else { 2 };
        result.judge = JudgeScore {
            score,
            threshold: 9.0,
            pass,
            ..JudgeScore::default()
        };
        if !pass {
            result.findings.push(Finding {
                code: "x".to_string(),
                message: "x detected".to_string(),
                source: "scenario".to_string(),
            });
            result.fixes_applied.push("fix 1".to_string());
        } else {
            result.fixes_applied
                .extend(["fix 1".to_string(), "fix 2".to_string()]);
        }
        let path = LoopPaths::new(repo_root).final_report_path(run_id);
        write_json(&path, &result).expect("write run");
    }

    #[test]
    fn passing_b_against_failing_a_is_positive() {
        let temp = tempfile::tempdir().expect("tempdir");
        store_run(temp.path(), "a", 8.5, false);
        store_run(temp.path(), "b", 9.5, true);

        let report = compare_runs(temp.path(), "a", "b").expect("compare");
        assert_eq!(report.delta.score, 1.0);
        assert_eq!(report.delta.pass_delta, 1);
        assert_eq!(report.delta.findings_delta, -1);
        assert_eq!(report.delta.fixes_applied_delta, 1);
    }

    #[test]
    fn unresolved_reference_names_the_side() {
        let temp = tempfile::tempdir().expect("tempdir");
        store_run(temp.path(), "a", 8.5, false);

        let err = compare_runs(temp.path(), "a", "missing").expect_err("unresolved");
        assert_eq!(exit_code_for(&err), EXIT_USAGE);
        assert!(format!("{err:#}").contains("run B"));
    }
}
