//! Test-only scripted collaborators and builders.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::Result;

use crate::core::types::{Finding, ScenarioResult};
use crate::failure::Failure;
use crate::io::detect::FindingDetector;
use crate::io::roles::{
    FixerOutput, JudgerOutput, PlannerOutput, Role, RoleContext, RoleExecutor,
    ROLE_SCHEMA_VERSION,
};
use crate::io::scenario::ScenarioRunner;

/// Create a temp repo that already passes the readiness check.
pub fn ready_repo() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("README.md"), "# project\n").expect("readme");
    std::fs::write(temp.path().join(".gitignore"), ".verifier/\n").expect("gitignore");
    std::fs::create_dir_all(temp.path().join(".verifier").join("runs")).expect("runs dir");
    temp
}

/// Create a deterministic finding.
pub fn finding(code: &str, source: &str) -> Finding {
    Finding {
        code: code.to_string(),
        message: format!("{code} detected"),
        source: source.to_string(),
    }
}

pub fn fixer_output(applied: Vec<String>) -> FixerOutput {
    FixerOutput {
        schema_version: ROLE_SCHEMA_VERSION.to_string(),
        applied,
        notes: "scripted fixer".to_string(),
    }
}

pub fn judger_output(extra_findings: Vec<Finding>) -> JudgerOutput {
    JudgerOutput {
        schema_version: ROLE_SCHEMA_VERSION.to_string(),
        extra_findings,
        notes: "scripted judger".to_string(),
    }
}

/// Scenario runner returning a predetermined result on every call.
pub struct ScriptedScenario {
    result: ScenarioResult,
}

impl ScriptedScenario {
    pub fn always_ok(name: &str) -> Self {
        Self {
            result: ScenarioResult {
                name: name.to_string(),
                ok: true,
                steps: Vec::new(),
            },
        }
    }

    pub fn always(result: ScenarioResult) -> Self {
        Self { result }
    }
}

impl ScenarioRunner for ScriptedScenario {
    fn run(&self) -> Result<ScenarioResult> {
        Ok(self.result.clone())
    }
}

/// Detector returning a constant list, or popping a queue call by call.
pub struct ScriptedDetector {
    queue: RefCell<VecDeque<Vec<Finding>>>,
    constant: Option<Vec<Finding>>,
}

impl ScriptedDetector {
    pub fn constant(findings: Vec<Finding>) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            constant: Some(findings),
        }
    }

    pub fn queued(batches: Vec<Vec<Finding>>) -> Self {
        Self {
            queue: RefCell::new(batches.into()),
            constant: None,
        }
    }
}

impl FindingDetector for ScriptedDetector {
    fn detect(&self, _scenario: &ScenarioResult) -> Result<Vec<Finding>> {
        if let Some(findings) = &self.constant {
            return Ok(findings.clone());
        }
        let batch = self
            .queue
            .borrow_mut()
            .pop_front()
            .expect("scripted detector exhausted");
        Ok(batch)
    }
}

enum FixerScript {
    Quiet,
    Constant(FixerOutput),
    OnePerCall(Cell<u32>),
}

enum JudgerScript {
    Quiet,
    Constant(JudgerOutput),
    Fail(String),
}

/// Role executor with scripted outputs and a `scripted` strategy label.
pub struct ScriptedRoles {
    fixer: FixerScript,
    judger: JudgerScript,
}

impl ScriptedRoles {
    /// Planner targets nothing, fixer applies nothing, judger adds nothing.
    pub fn all_quiet() -> Self {
        Self {
            fixer: FixerScript::Quiet,
            judger: JudgerScript::Quiet,
        }
    }

    /// Fixer reports exactly one applied fix per call.
    pub fn fixing_one_per_call() -> Self {
        Self {
            fixer: FixerScript::OnePerCall(Cell::new(0)),
            judger: JudgerScript::Quiet,
        }
    }

    pub fn with_fixer(mut self, output: FixerOutput) -> Self {
        self.fixer = FixerScript::Constant(output);
        self
    }

    pub fn with_judger(mut self, output: JudgerOutput) -> Self {
        self.judger = JudgerScript::Constant(output);
        self
    }

    pub fn with_failing_judger(mut self, message: &str) -> Self {
        self.judger = JudgerScript::Fail(message.to_string());
        self
    }
}

impl RoleExecutor for ScriptedRoles {
    fn strategy_label(&self, _role: Role) -> String {
        "scripted".to_string()
    }

    fn run_planner(&self, ctx: &RoleContext) -> Result<PlannerOutput> {
        Ok(PlannerOutput {
            schema_version: ROLE_SCHEMA_VERSION.to_string(),
            summary: "scripted planner".to_string(),
            fix_targets: ctx.findings.iter().map(|f| f.code.clone()).collect(),
        })
    }

    fn run_fixer(&self, _ctx: &RoleContext) -> Result<FixerOutput> {
        match &self.fixer {
            FixerScript::Quiet => Ok(fixer_output(Vec::new())),
            FixerScript::Constant(output) => Ok(output.clone()),
            FixerScript::OnePerCall(calls) => {
                calls.set(calls.get() + 1);
                Ok(fixer_output(vec![format!(
                    "scripted: fix #{}",
                    calls.get()
                )]))
            }
        }
    }

    fn run_judger(&self, _ctx: &RoleContext) -> Result<JudgerOutput> {
        match &self.judger {
            JudgerScript::Quiet => Ok(judger_output(Vec::new())),
            JudgerScript::Constant(output) => Ok(output.clone()),
            JudgerScript::Fail(message) => Err(Failure::execution(message.clone()).into()),
        }
    }
}
