//! Pure scoring of a scenario result plus findings against a threshold.
//!
//! The formula is a documented choice; callers may rely on the contract only:
//! deterministic, monotonic in the finding set, bounded to [0, 10], and
//! `pass == (score >= threshold)`.

use crate::core::types::{Finding, JudgeScore, ScenarioResult};

/// Upper bound of the score range.
pub const SCORE_MAX: f64 = 10.0;
/// Deduction per finding.
pub const FINDING_PENALTY: f64 = 1.25;
/// Ceiling applied when the scenario itself failed, regardless of findings.
pub const SCENARIO_FAIL_CEILING: f64 = 4.0;

/// Source tag whose findings deduct from the judger sub-score; every other
/// source deducts from the fixer.
const JUDGER_SOURCE: &str = "judger";

/// Score a run in classic mode (sub-scores stay zero).
pub fn score(scenario: &ScenarioResult, findings: &[Finding], threshold: f64) -> JudgeScore {
    let total = deduct(scenario, findings.len());
    JudgeScore {
        score: total,
        threshold,
        pass: total >= threshold,
        planner_score: 0.0,
        fixer_score: 0.0,
        judger_score: 0.0,
    }
}

/// Score a run in committee mode, attributing deductions per role.
///
/// Attribution is a pure function of the same inputs: findings tagged with the
/// judger source deduct from the judger, all others from the fixer, and the
/// planner carries the overall score because the plan owns the aggregate
/// outcome.
pub fn score_committee(
    scenario: &ScenarioResult,
    findings: &[Finding],
    threshold: f64,
) -> JudgeScore {
    let judger_count = findings.iter().filter(|f| f.source == JUDGER_SOURCE).count();
    let fixer_count = findings.len() - judger_count;

    let total = deduct(scenario, findings.len());
    JudgeScore {
        score: total,
        threshold,
        pass: total >= threshold,
        planner_score: total,
        fixer_score: deduct(scenario, fixer_count),
        judger_score: deduct(scenario, judger_count),
    }
}

fn deduct(scenario: &ScenarioResult, findings: usize) -> f64 {
    let raw = SCORE_MAX - FINDING_PENALTY * findings as f64;
    let bounded = raw.clamp(0.0, SCORE_MAX);
    if scenario.ok {
        bounded
    } else {
        bounded.min(SCENARIO_FAIL_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(ok: bool) -> ScenarioResult {
        ScenarioResult {
            name: "probe".to_string(),
            ok,
            steps: Vec::new(),
        }
    }

    fn finding(code: &str, source: &str) -> Finding {
        Finding {
            code: code.to_string(),
            message: format!("{code} detected"),
            source: source.to_string(),
        }
    }

    #[test]
    fn pass_tracks_threshold_identity() {
        for count in 0..12 {
            let findings: Vec<Finding> = (0..count)
                .map(|i| finding(&format!("f{i}"), "scenario"))
                .collect();
            for threshold in [0.0, 5.0, 9.0, 10.0] {
                let verdict = score(&scenario(true), &findings, threshold);
                assert_eq!(verdict.pass, verdict.score >= threshold);
            }
        }
    }

    #[test]
    fn fewer_findings_never_score_lower() {
        let full: Vec<Finding> = (0..6)
            .map(|i| finding(&format!("f{i}"), "scenario"))
            .collect();
        for keep in 0..full.len() {
            let subset = &full[..keep];
            let sub = score(&scenario(true), subset, 9.0);
            let all = score(&scenario(true), &full, 9.0);
            assert!(sub.score >= all.score);
        }
    }

    #[test]
    fn score_stays_bounded() {
        let many: Vec<Finding> = (0..30)
            .map(|i| finding(&format!("f{i}"), "scenario"))
            .collect();
        let verdict = score(&scenario(true), &many, 9.0);
        assert_eq!(verdict.score, 0.0);

        let verdict = score(&scenario(true), &[], 9.0);
        assert_eq!(verdict.score, SCORE_MAX);
    }

    #[test]
    fn failed_scenario_caps_score() {
        let verdict = score(&scenario(false), &[], 9.0);
        assert!(verdict.score <= SCENARIO_FAIL_CEILING);
        assert!(!verdict.pass);
    }

    #[test]
    fn single_finding_fails_nine_threshold() {
        // The fix-one-per-iteration lifecycle depends on one remaining finding
        // scoring below 9.0 while a clean state scores 10.0.
        let verdict = score(&scenario(true), &[finding("left", "scenario")], 9.0);
        assert!(!verdict.pass);
        let verdict = score(&scenario(true), &[], 9.0);
        assert!(verdict.pass);
    }

    #[test]
    fn committee_attributes_deductions_by_source() {
        let findings = vec![
            finding("a", "scenario"),
            finding("b", "readiness"),
            finding("c", "judger"),
        ];
        let verdict = score_committee(&scenario(true), &findings, 9.0);
        assert_eq!(verdict.planner_score, verdict.score);
        assert_eq!(verdict.fixer_score, SCORE_MAX - 2.0 * FINDING_PENALTY);
        assert_eq!(verdict.judger_score, SCORE_MAX - FINDING_PENALTY);
    }

    #[test]
    fn classic_score_leaves_sub_scores_zero() {
        let verdict = score(&scenario(true), &[finding("a", "scenario")], 9.0);
        assert_eq!(verdict.planner_score, 0.0);
        assert_eq!(verdict.fixer_score, 0.0);
        assert_eq!(verdict.judger_score, 0.0);
    }
}
