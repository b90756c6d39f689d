//! Role resolution and execution for the committee loop.
//!
//! A role (planner, fixer, judger) is satisfied either by a builtin
//! deterministic procedure or by invoking an external process: the role
//! context is written to a JSON file, the configured command is run with that
//! path as its final argument, and its stdout is validated against an embedded
//! JSON Schema before deserialization.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Finding, Mode, ScenarioResult};
use crate::failure::{Failure, FailureKind};
use crate::io::fixes::apply_builtin_fixes;
use crate::io::process::run_command_with_timeout;

pub const ROLE_SCHEMA_VERSION: &str = "v1";

const PLANNER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/planner_output.schema.json");
const FIXER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/fixer_output.schema.json");
const JUDGER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/judger_output.schema.json");

const ROLE_TIMEOUT: Duration = Duration::from_secs(300);
const ROLE_OUTPUT_LIMIT_BYTES: usize = 200_000;

/// Committee role identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Planner,
    Fixer,
    Judger,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Fixer => "fixer",
            Role::Judger => "judger",
        }
    }
}

/// Per-role configuration as written in the role config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSpec {
    /// Explicit strategy label; wins over command-derived resolution.
    #[serde(default)]
    pub strategy: Option<String>,
    /// External invocation line; whitespace-split, context path appended.
    #[serde(default)]
    pub command: Option<String>,
}

/// The three role specs composing a committee.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    #[serde(default)]
    pub planner: RoleSpec,
    #[serde(default)]
    pub fixer: RoleSpec,
    #[serde(default)]
    pub judger: RoleSpec,
}

/// Load the role configuration.
///
/// No path means all roles builtin. A configured path that cannot be read is
/// file-io; present-but-invalid JSON is contract-validation, so callers can
/// tell "file absent" from "file present but invalid".
pub fn load_role_config(path: Option<&Path>) -> Result<RoleConfig> {
    let Some(path) = path else {
        return Ok(RoleConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(|err| {
        Failure::file_io(format!("read role config {}: {err}", path.display()))
    })?;
    let cfg: RoleConfig = serde_json::from_str(&raw).map_err(|err| {
        Failure::contract_validation(format!("parse role config {}: {err}", path.display()))
    })?;
    Ok(cfg)
}

/// Execution strategy, resolved once per role at loop start.
///
/// The label is descriptive metadata only; execution branches on command
/// presence, never on the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Builtin,
    External { command: String },
    Named { label: String, command: Option<String> },
}

impl Strategy {
    pub fn resolve(spec: &RoleSpec) -> Self {
        let command = spec
            .command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if let Some(label) = spec.strategy.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Strategy::Named {
                label: label.to_string(),
                command,
            };
        }
        match command {
            Some(command) => Strategy::External { command },
            None => Strategy::Builtin,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Strategy::Builtin => "builtin",
            Strategy::External { .. } => "external",
            Strategy::Named { label, .. } => label,
        }
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Strategy::Builtin => None,
            Strategy::External { command } => Some(command),
            Strategy::Named { command, .. } => command.as_deref(),
        }
    }
}

/// Context serialized for each role invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleContext {
    pub run_id: String,
    pub mode: Mode,
    pub iteration: u32,
    pub threshold: f64,
    pub budget: u32,
    pub seed: i64,
    pub scenario: ScenarioResult,
    pub findings: Vec<Finding>,
    pub fixes_so_far: Vec<String>,
    pub repo_root: PathBuf,
    pub artifact_dir: PathBuf,
    /// Planner output, present only for the fixer invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlannerOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerOutput {
    pub schema_version: String,
    pub summary: String,
    pub fix_targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixerOutput {
    pub schema_version: String,
    pub applied: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JudgerOutput {
    pub schema_version: String,
    pub extra_findings: Vec<Finding>,
    #[serde(default)]
    pub notes: String,
}

/// Abstraction over role execution backends. Tests use scripted executors.
pub trait RoleExecutor {
    /// Resolved strategy label for metadata; computed the same way whether or
    /// not execution succeeds.
    fn strategy_label(&self, role: Role) -> String;
    fn run_planner(&self, ctx: &RoleContext) -> Result<PlannerOutput>;
    fn run_fixer(&self, ctx: &RoleContext) -> Result<FixerOutput>;
    fn run_judger(&self, ctx: &RoleContext) -> Result<JudgerOutput>;
}

/// Production role executor: builtin procedures or external processes per the
/// role configuration, resolved once at construction.
#[derive(Debug, Clone)]
pub struct ConfiguredRoles {
    planner: Strategy,
    fixer: Strategy,
    judger: Strategy,
}

impl ConfiguredRoles {
    pub fn new(config: &RoleConfig) -> Self {
        Self {
            planner: Strategy::resolve(&config.planner),
            fixer: Strategy::resolve(&config.fixer),
            judger: Strategy::resolve(&config.judger),
        }
    }

    fn strategy(&self, role: Role) -> &Strategy {
        match role {
            Role::Planner => &self.planner,
            Role::Fixer => &self.fixer,
            Role::Judger => &self.judger,
        }
    }
}

impl RoleExecutor for ConfiguredRoles {
    fn strategy_label(&self, role: Role) -> String {
        self.strategy(role).label().to_string()
    }

    #[instrument(skip_all, fields(iteration = ctx.iteration))]
    fn run_planner(&self, ctx: &RoleContext) -> Result<PlannerOutput> {
        match self.planner.command() {
            Some(command) => run_external_role(Role::Planner, command, ctx, PLANNER_OUTPUT_SCHEMA),
            None => Ok(builtin_planner(ctx)),
        }
    }

    #[instrument(skip_all, fields(iteration = ctx.iteration))]
    fn run_fixer(&self, ctx: &RoleContext) -> Result<FixerOutput> {
        match self.fixer.command() {
            Some(command) => run_external_role(Role::Fixer, command, ctx, FIXER_OUTPUT_SCHEMA),
            None => builtin_fixer(ctx),
        }
    }

    #[instrument(skip_all, fields(iteration = ctx.iteration))]
    fn run_judger(&self, ctx: &RoleContext) -> Result<JudgerOutput> {
        match self.judger.command() {
            Some(command) => run_external_role(Role::Judger, command, ctx, JUDGER_OUTPUT_SCHEMA),
            None => Ok(builtin_judger()),
        }
    }
}

/// Builtin planner: summarize current findings into a target list.
fn builtin_planner(ctx: &RoleContext) -> PlannerOutput {
    let mut fix_targets: Vec<String> = ctx
        .findings
        .iter()
        .map(|f| f.code.clone())
        .filter(|code| !code.trim().is_empty())
        .collect();
    if fix_targets.is_empty() {
        fix_targets.push("none".to_string());
    }
    PlannerOutput {
        schema_version: ROLE_SCHEMA_VERSION.to_string(),
        summary: format!("planner targeted {} finding(s)", ctx.findings.len()),
        fix_targets,
    }
}

/// Builtin fixer: apply the catalog to the findings the planner targeted.
fn builtin_fixer(ctx: &RoleContext) -> Result<FixerOutput> {
    let targeted: Vec<Finding> = match &ctx.plan {
        Some(plan) => ctx
            .findings
            .iter()
            .filter(|f| plan.fix_targets.contains(&f.code))
            .cloned()
            .collect(),
        None => ctx.findings.clone(),
    };
    let applied = apply_builtin_fixes(&ctx.repo_root, &targeted, ctx.budget)?;
    Ok(FixerOutput {
        schema_version: ROLE_SCHEMA_VERSION.to_string(),
        applied,
        notes: "builtin fixer applied catalog remediations".to_string(),
    })
}

/// Builtin judger: reviews the post-fix context and adds no findings.
fn builtin_judger() -> JudgerOutput {
    JudgerOutput {
        schema_version: ROLE_SCHEMA_VERSION.to_string(),
        extra_findings: Vec::new(),
        notes: "builtin judger reviewed post-fix scenario".to_string(),
    }
}

fn run_external_role<T: serde::de::DeserializeOwned>(
    role: Role,
    command: &str,
    ctx: &RoleContext,
    schema: &str,
) -> Result<T> {
    let context_path = write_role_context(role, ctx)?;
    info!(role = role.as_str(), command, "invoking external role");

    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or_else(|| {
        Failure::execution(format!("empty command for {} role", role.as_str()))
    })?;
    let mut cmd = Command::new(program);
    cmd.args(parts).arg(&context_path).current_dir(&ctx.repo_root);

    let output = match run_command_with_timeout(cmd, None, ROLE_TIMEOUT, ROLE_OUTPUT_LIMIT_BYTES) {
        Ok(output) => output,
        Err(err) if spawn_failed_not_found(&err) => {
            return Err(Failure::new(
                FailureKind::MissingDependency,
                format!(
                    "external {} role command not found: {program}",
                    role.as_str()
                ),
            )
            .into());
        }
        Err(err) => {
            return Err(err.context(format!("run external {} role", role.as_str())));
        }
    };

    if output.timed_out {
        warn!(role = role.as_str(), "external role timed out");
        return Err(Failure::execution(format!(
            "external {} role timed out",
            role.as_str()
        ))
        .into());
    }
    if !output.status.success() {
        warn!(role = role.as_str(), exit_code = ?output.status.code(), "external role failed");
        return Err(Failure::execution(format!(
            "external {} role exited with {:?}: {}",
            role.as_str(),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }

    parse_role_output(role, &output.stdout, schema)
}

fn spawn_failed_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
    })
}

fn parse_role_output<T: serde::de::DeserializeOwned>(
    role: Role,
    stdout: &[u8],
    schema: &str,
) -> Result<T> {
    let value: Value = serde_json::from_slice(stdout).map_err(|err| {
        Failure::execution(format!(
            "external {} role produced invalid JSON: {err}",
            role.as_str()
        ))
    })?;
    validate_schema(role, &value, schema)?;
    let output = serde_json::from_value(value).map_err(|err| {
        Failure::execution(format!(
            "external {} role output did not match its contract: {err}",
            role.as_str()
        ))
    })?;
    Ok(output)
}

/// Validate role output against its embedded JSON Schema (Draft 2020-12).
fn validate_schema(role: Role, instance: &Value, schema: &str) -> Result<()> {
    let schema_json: Value = serde_json::from_str(schema).context("parse embedded role schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema_json)
        .context("compile role output schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(Failure::execution(format!(
            "external {} role output failed schema validation: {}",
            role.as_str(),
            messages.join("; ")
        ))
        .into());
    }
    Ok(())
}

/// Write a role's context JSON under the iteration artifact directory.
pub fn write_role_context(role: Role, ctx: &RoleContext) -> Result<PathBuf> {
    fs::create_dir_all(&ctx.artifact_dir)
        .with_context(|| format!("create artifact dir {}", ctx.artifact_dir.display()))?;
    let path = ctx
        .artifact_dir
        .join(format!("{}-context.json", role.as_str()));
    let mut buf = serde_json::to_string_pretty(ctx).context("serialize role context")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    debug!(role = role.as_str(), path = %path.display(), "wrote role context");
    Ok(path)
}
