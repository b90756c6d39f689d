//! Verification loop for scaffolded projects.
//!
//! This crate runs a fixed scenario against a project, collects findings,
//! optionally invokes planner/fixer/judger roles to repair them, scores the
//! result against a pass threshold, and persists reproducible reports. It can
//! also compare two historical runs and detect behavioral drift against a
//! stored baseline. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, scoring, snapshots,
//!   deltas). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, role
//!   invocation, fix application, artifact persistence, git). Isolated to
//!   enable mocking in tests.
//!
//! Orchestration modules ([`looping`], [`classic`], [`committee`],
//! [`compare`], [`regression`]) coordinate core logic with I/O to implement
//! CLI commands.

pub mod classic;
pub mod committee;
pub mod compare;
pub mod config;
pub mod core;
pub mod failure;
pub mod io;
pub mod logging;
pub mod looping;
pub mod profiles;
pub mod regression;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
