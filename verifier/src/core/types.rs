//! Core data model shared across the loop, reporter, and comparators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution mode for one loop invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Single-pass loop with builtin fixes only.
    Classic,
    /// Planner / fixer / judger committee loop.
    Committee,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Classic => "classic",
            Mode::Committee => "committee",
        }
    }
}

/// One command executed as part of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioStep {
    pub command: String,
    pub ok: bool,
    pub exit_code: Option<i32>,
}

/// Result of one scenario execution.
///
/// The loop itself reads only `name` and `ok`; `steps` exist for detectors
/// and for external roles, which receive the full result in their context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioResult {
    pub name: String,
    pub ok: bool,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// A detected deviation from expected project state or behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    /// Stable machine-readable identifier.
    pub code: String,
    pub message: String,
    /// Subsystem that raised the finding (`scenario`, `readiness`, `judger`, ...).
    pub source: String,
}

/// Scoring verdict for one iteration's combined findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JudgeScore {
    pub score: f64,
    pub threshold: f64,
    pub pass: bool,
    /// Committee sub-scores; zero-valued in classic mode.
    pub planner_score: f64,
    pub fixer_score: f64,
    pub judger_score: f64,
}

/// Metadata about how one role was executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleExecution {
    /// Resolved strategy label (`builtin`, `external`, or a caller-supplied name).
    pub strategy: String,
    /// True only for the judger, whose output must not reuse fixer-visible
    /// state beyond what the post-fix context passes explicitly.
    pub independent: bool,
}

/// Role executions recorded for a committee run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitteeMeta {
    pub planner: RoleExecution,
    pub fixer: RoleExecution,
    pub judger: RoleExecution,
}

pub const RUN_SCHEMA_VERSION: &str = "v1";

/// Cumulative result of one loop invocation.
///
/// Created and owned by a single loop run; never mutated after being returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub schema_version: String,
    pub run_id: String,
    pub mode: Mode,
    pub branch: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of iterations actually executed (>= 1).
    pub iterations: u32,
    /// Scenario result from the final iteration.
    pub scenario: ScenarioResult,
    /// Findings from the final iteration, in detection order.
    pub findings: Vec<Finding>,
    pub judge: JudgeScore,
    /// Append-only log of fix descriptions across all iterations.
    pub fixes_applied: Vec<String>,
    /// Present in committee mode only.
    pub committee: Option<CommitteeMeta>,
}

impl RunResult {
    /// Skeleton result for a run that has not completed an iteration yet.
    pub fn new(run_id: &str, mode: Mode, branch: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: RUN_SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            mode,
            branch: branch.to_string(),
            started_at,
            finished_at: started_at,
            iterations: 0,
            scenario: ScenarioResult {
                name: String::new(),
                ok: false,
                steps: Vec::new(),
            },
            findings: Vec::new(),
            judge: JudgeScore::default(),
            fixes_applied: Vec::new(),
            committee: None,
        }
    }
}
