//! Persistence helpers for run reports.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::RunResult;
use crate::failure::Failure;
use crate::io::paths::LoopPaths;

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Load a run report from an explicit file path.
pub fn load_run(path: &Path) -> Result<RunResult> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let result: RunResult = serde_json::from_str(&raw)
        .with_context(|| format!("parse run report {}", path.display()))?;
    Ok(result)
}

/// Resolve a run reference to a report file.
///
/// A reference is either a literal file path (when it exists and is a file) or
/// a run id under the canonical runs directory. An unresolved reference is a
/// usage-class error naming the reference.
pub fn load_run_by_ref(repo_root: &Path, run_ref: &str) -> Result<RunResult> {
    let run_ref = run_ref.trim();
    if run_ref.is_empty() {
        return Err(Failure::usage("empty run reference").into());
    }
    let literal = PathBuf::from(run_ref);
    if literal.is_file() {
        return load_run(&literal);
    }
    let candidate = LoopPaths::new(repo_root).final_report_path(run_ref);
    if candidate.is_file() {
        return load_run(&candidate);
    }
    Err(Failure::usage(format!("run report not found: {run_ref}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Mode, RunResult};
    use crate::failure::{EXIT_USAGE, exit_code_for};
    use chrono::Utc;

    fn sample(run_id: &str) -> RunResult {
        RunResult::new(run_id, Mode::Classic, "main", Utc::now())
    }

    #[test]
    fn resolves_literal_path_and_run_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = sample("20260101-000001");

        let paths = LoopPaths::new(temp.path());
        let report = paths.final_report_path(&result.run_id);
        write_json(&report, &result).expect("write");

        let by_path = load_run_by_ref(temp.path(), report.to_str().expect("utf8")).expect("path");
        assert_eq!(by_path.run_id, result.run_id);

        let by_id = load_run_by_ref(temp.path(), "20260101-000001").expect("id");
        assert_eq!(by_id.run_id, result.run_id);
    }

    #[test]
    fn unresolved_reference_is_usage_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_run_by_ref(temp.path(), "nope").expect_err("unresolved");
        assert_eq!(exit_code_for(&err), EXIT_USAGE);
        assert!(err.to_string().contains("nope"));
    }
}
