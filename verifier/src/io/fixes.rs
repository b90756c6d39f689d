//! Builtin catalog of safe, idempotent fix actions matched by finding code.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::types::Finding;
use crate::io::detect::{CODE_ARTIFACTS_UNIGNORED, CODE_RUNS_DIR_MISSING};

const GITIGNORE_LINE: &str = ".verifier/";

/// Apply builtin fixes for the given findings.
///
/// Each catalog entry runs at most once per call, only when a matching finding
/// code is present, and reports whether it actually changed anything, so a
/// second invocation against the same repo applies nothing. `budget` bounds
/// how many actions are attempted when nonzero. Returns the descriptions of
/// applied fixes, in catalog order.
pub fn apply_builtin_fixes(
    repo_root: &Path,
    findings: &[Finding],
    budget: u32,
) -> Result<Vec<String>> {
    let catalog: [(&str, &str, fn(&Path) -> Result<bool>); 2] = [
        (
            CODE_ARTIFACTS_UNIGNORED,
            "builtin: ignore .verifier/ in .gitignore",
            ensure_gitignore_line,
        ),
        (
            CODE_RUNS_DIR_MISSING,
            "builtin: create .verifier/runs",
            ensure_runs_dir,
        ),
    ];

    let mut applied = Vec::new();
    for (code, description, action) in catalog {
        if budget > 0 && applied.len() as u32 >= budget {
            debug!(budget, "fix budget exhausted");
            break;
        }
        if !findings.iter().any(|f| f.code == code) {
            continue;
        }
        if action(repo_root).with_context(|| format!("apply fix for {code}"))? {
            info!(code, "applied builtin fix");
            applied.push(description.to_string());
        }
    }
    Ok(applied)
}

fn ensure_gitignore_line(repo_root: &Path) -> Result<bool> {
    let path = repo_root.join(".gitignore");
    let contents = if path.exists() {
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?
    } else {
        String::new()
    };
    if contents.lines().any(|line| line.trim() == GITIGNORE_LINE) {
        return Ok(false);
    }
    let mut updated = contents;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(GITIGNORE_LINE);
    updated.push('\n');
    fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}

fn ensure_runs_dir(repo_root: &Path) -> Result<bool> {
    let dir = repo_root.join(".verifier").join("runs");
    if dir.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(true)
}
