//! Regression baseline files: versioned JSON snapshots on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::snapshot::BehaviorSnapshot;
use crate::failure::Failure;
use crate::io::run_store::write_json;

pub const BASELINE_SCHEMA_VERSION: &str = "v1";
pub const BASELINE_KIND: &str = "loop_behavior";

/// Stored behavior baseline for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionBaseline {
    pub schema_version: String,
    pub kind: String,
    pub profile: String,
    pub generated_at: DateTime<Utc>,
    pub snapshot: BehaviorSnapshot,
}

impl RegressionBaseline {
    pub fn new(profile: &str, snapshot: BehaviorSnapshot) -> Self {
        Self {
            schema_version: BASELINE_SCHEMA_VERSION.to_string(),
            kind: BASELINE_KIND.to_string(),
            profile: profile.to_string(),
            generated_at: Utc::now(),
            snapshot,
        }
    }
}

/// Default baseline location for a profile.
pub fn default_baseline_path(repo_root: &Path, profile: &str) -> PathBuf {
    repo_root
        .join("testdata")
        .join("regression")
        .join(format!("loop-{profile}.behavior-baseline.json"))
}

/// Read a baseline file.
///
/// A missing file is contract-validation, not "no baseline": callers must
/// explicitly opt into creating one, so a regressed behavior is never
/// silently accepted as the new normal. The hint names the exact invocation.
pub fn read_regression_baseline(path: &Path, profile: &str) -> Result<RegressionBaseline> {
    if !path.is_file() {
        return Err(Failure::contract_validation(format!(
            "regression baseline not found: {}",
            path.display()
        ))
        .with_hint(format!(
            "create it with `verifier regression write --profile {profile}`"
        ))
        .into());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let baseline: RegressionBaseline = serde_json::from_str(&raw).map_err(|err| {
        Failure::contract_validation(format!("parse baseline {}: {err}", path.display()))
    })?;
    if baseline.schema_version != BASELINE_SCHEMA_VERSION || baseline.kind != BASELINE_KIND {
        return Err(Failure::contract_validation(format!(
            "baseline {} has schema {}/{} (want {}/{})",
            path.display(),
            baseline.schema_version,
            baseline.kind,
            BASELINE_SCHEMA_VERSION,
            BASELINE_KIND
        ))
        .into());
    }
    debug!(path = %path.display(), profile = %baseline.profile, "baseline loaded");
    Ok(baseline)
}

/// Write a baseline file, creating parent directories as needed.
pub fn write_regression_baseline(path: &Path, baseline: &RegressionBaseline) -> Result<()> {
    write_json(path, baseline)
}
