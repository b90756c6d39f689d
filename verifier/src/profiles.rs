//! Loop profiles: builtin table with optional file override.
//!
//! Resolution is an explicit two-layer merge called fresh per invocation, not
//! global state: builtin defaults, then per-profile overrides from
//! `.verifier/profiles.toml` when that file exists.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::core::types::Mode;

pub const PROFILES_FILE: &str = ".verifier/profiles.toml";

/// Loop defaults selectable by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub threshold: f64,
    pub max_iterations: u32,
    pub mode: Mode,
    pub auto_fix: bool,
}

/// Partial profile as written in the override file; unset fields keep the
/// builtin (or, for new names, default) values.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ProfileOverride {
    threshold: Option<f64>,
    max_iterations: Option<u32>,
    mode: Option<Mode>,
    auto_fix: Option<bool>,
}

pub fn builtin_profiles() -> BTreeMap<String, Profile> {
    BTreeMap::from([
        (
            "quick".to_string(),
            Profile {
                threshold: 7.0,
                max_iterations: 1,
                mode: Mode::Classic,
                auto_fix: false,
            },
        ),
        (
            "standard".to_string(),
            Profile {
                threshold: 9.0,
                max_iterations: 3,
                mode: Mode::Classic,
                auto_fix: true,
            },
        ),
        (
            "committee".to_string(),
            Profile {
                threshold: 9.0,
                max_iterations: 3,
                mode: Mode::Committee,
                auto_fix: true,
            },
        ),
    ])
}

/// Resolve the effective profile table for a repo.
///
/// Missing override file means builtins as-is; a present-but-invalid file is
/// an error, never silently ignored.
pub fn resolve_profiles(repo_root: &Path) -> Result<BTreeMap<String, Profile>> {
    let path = repo_root.join(PROFILES_FILE);
    if !path.exists() {
        return Ok(builtin_profiles());
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let overrides: BTreeMap<String, ProfileOverride> =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    merge_profiles(builtin_profiles(), overrides)
}

fn merge_profiles(
    builtin: BTreeMap<String, Profile>,
    overrides: BTreeMap<String, ProfileOverride>,
) -> Result<BTreeMap<String, Profile>> {
    let mut merged = builtin;
    for (name, over) in overrides {
        validate_profile_name(&name)?;
        let base = merged.get(&name).cloned().unwrap_or(Profile {
            threshold: 9.0,
            max_iterations: 3,
            mode: Mode::Classic,
            auto_fix: false,
        });
        let profile = Profile {
            threshold: over.threshold.unwrap_or(base.threshold),
            max_iterations: over.max_iterations.unwrap_or(base.max_iterations),
            mode: over.mode.unwrap_or(base.mode),
            auto_fix: over.auto_fix.unwrap_or(base.auto_fix),
        };
        if profile.max_iterations == 0 {
            bail!("profile {name}: max_iterations must be >= 1");
        }
        merged.insert(name, profile);
    }
    Ok(merged)
}

fn validate_profile_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("profile name must be non-empty");
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("profile name {name} must use [a-z0-9_-] only");
    }
    Ok(())
}
