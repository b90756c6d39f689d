//! Pure delta computation between two historical runs.

use serde::{Deserialize, Serialize};

use crate::core::types::RunResult;

pub const COMPARE_SCHEMA_VERSION: &str = "v1";

/// Directional delta, always B minus A, so the sign distinguishes regression
/// from improvement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompareDelta {
    pub score: f64,
    pub pass_delta: i32,
    pub findings_delta: i64,
    pub iterations_delta: i64,
    pub fixes_applied_delta: i64,
}

/// Two full runs plus their computed delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompareReport {
    pub schema_version: String,
    pub run_a: RunResult,
    pub run_b: RunResult,
    pub delta: CompareDelta,
}

pub fn compute_delta(a: &RunResult, b: &RunResult) -> CompareDelta {
    CompareDelta {
        score: b.judge.score - a.judge.score,
        pass_delta: i32::from(b.judge.pass) - i32::from(a.judge.pass),
        findings_delta: b.findings.len() as i64 - a.findings.len() as i64,
        iterations_delta: i64::from(b.iterations) - i64::from(a.iterations),
        fixes_applied_delta: b.fixes_applied.len() as i64 - a.fixes_applied.len() as i64,
    }
}
