//! Behavior snapshots and drift detection for regression baselines.
//!
//! A snapshot is a deterministic projection of a [`RunResult`] that keeps only
//! behavior-relevant fields and strips volatile ones (timestamps, run id,
//! branch). Two snapshots built from the same result are byte-identical when
//! serialized.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::types::{Mode, RunResult};

/// Finding projection retained in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotFinding {
    pub code: String,
    pub source: String,
}

/// Behavior-only projection of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviorSnapshot {
    pub mode: Mode,
    pub pass: bool,
    pub score: f64,
    pub iterations: u32,
    /// Sorted and deduplicated; detector ordering is not a behavioral
    /// guarantee worth pinning.
    pub findings: Vec<SnapshotFinding>,
    pub fixes_applied: Vec<String>,
}

impl BehaviorSnapshot {
    /// Short stable digest of the snapshot, for log and report lines.
    pub fn fingerprint(&self) -> String {
        let payload = serde_json::to_vec(self)
            .unwrap_or_else(|_| b"snapshot-serialization-error".to_vec());
        let digest = Sha256::digest(&payload);
        hex::encode(&digest[..12])
    }
}

/// Classification of one behavioral difference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    PassFlipped,
    ScoreDelta,
    IterationsDelta,
    FindingAdded,
    FindingRemoved,
    FixesDelta,
    ModeChanged,
}

impl DriftKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DriftKind::PassFlipped => "pass_flipped",
            DriftKind::ScoreDelta => "score_delta",
            DriftKind::IterationsDelta => "iterations_delta",
            DriftKind::FindingAdded => "finding_added",
            DriftKind::FindingRemoved => "finding_removed",
            DriftKind::FixesDelta => "fixes_delta",
            DriftKind::ModeChanged => "mode_changed",
        }
    }
}

/// One detected behavioral difference between baseline and fresh snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegressionDrift {
    pub field: String,
    pub baseline: String,
    pub current: String,
    pub kind: DriftKind,
}

/// Project a run result onto its behavior snapshot.
pub fn build_behavior_snapshot(result: &RunResult) -> BehaviorSnapshot {
    let mut findings: Vec<SnapshotFinding> = result
        .findings
        .iter()
        .map(|f| SnapshotFinding {
            code: f.code.clone(),
            source: f.source.clone(),
        })
        .collect();
    findings.sort();
    findings.dedup();

    BehaviorSnapshot {
        mode: result.mode,
        pass: result.judge.pass,
        score: result.judge.score,
        iterations: result.iterations,
        findings,
        fixes_applied: result.fixes_applied.clone(),
    }
}

/// Diff two snapshots. Emits zero or one drift entries per tracked field, and
/// one entry per added or removed finding code (set difference, not
/// positional). Reports only that behavior changed, never why.
pub fn compare_behavior_snapshot(
    baseline: &BehaviorSnapshot,
    fresh: &BehaviorSnapshot,
) -> Vec<RegressionDrift> {
    let mut drifts = Vec::new();

    if baseline.mode != fresh.mode {
        drifts.push(RegressionDrift {
            field: "mode".to_string(),
            baseline: baseline.mode.as_str().to_string(),
            current: fresh.mode.as_str().to_string(),
            kind: DriftKind::ModeChanged,
        });
    }
    if baseline.pass != fresh.pass {
        drifts.push(RegressionDrift {
            field: "pass".to_string(),
            baseline: baseline.pass.to_string(),
            current: fresh.pass.to_string(),
            kind: DriftKind::PassFlipped,
        });
    }
    if baseline.score != fresh.score {
        drifts.push(RegressionDrift {
            field: "score".to_string(),
            baseline: format!("{:.2}", baseline.score),
            current: format!("{:.2}", fresh.score),
            kind: DriftKind::ScoreDelta,
        });
    }
    if baseline.iterations != fresh.iterations {
        drifts.push(RegressionDrift {
            field: "iterations".to_string(),
            baseline: baseline.iterations.to_string(),
            current: fresh.iterations.to_string(),
            kind: DriftKind::IterationsDelta,
        });
    }

    for added in fresh.findings.iter().filter(|f| !baseline.findings.contains(f)) {
        drifts.push(RegressionDrift {
            field: format!("findings.{}", added.code),
            baseline: "absent".to_string(),
            current: added.source.clone(),
            kind: DriftKind::FindingAdded,
        });
    }
    for removed in baseline.findings.iter().filter(|f| !fresh.findings.contains(f)) {
        drifts.push(RegressionDrift {
            field: format!("findings.{}", removed.code),
            baseline: removed.source.clone(),
            current: "absent".to_string(),
            kind: DriftKind::FindingRemoved,
        });
    }

    if baseline.fixes_applied.len() != fresh.fixes_applied.len() {
        drifts.push(RegressionDrift {
            field: "fixes_applied".to_string(),
            baseline: baseline.fixes_applied.len().to_string(),
            current: fresh.fixes_applied.len().to_string(),
            kind: DriftKind::FixesDelta,
        });
    }

    drifts
}
