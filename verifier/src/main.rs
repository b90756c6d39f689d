//! Verification loop CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use verifier::compare::compare_runs;
use verifier::config::Config;
use verifier::core::types::Mode;
use verifier::failure::{self, Failure};
use verifier::io::detect::StepFailureDetector;
use verifier::io::reporter::write_reports;
use verifier::io::roles::{ConfiguredRoles, load_role_config};
use verifier::io::scenario::{CommandScenario, ScenarioDescriptor};
use verifier::looping::run_loop;
use verifier::profiles::resolve_profiles;
use verifier::logging;
use verifier::regression::{check_regression, write_baseline};

#[derive(Parser)]
#[command(
    name = "verifier",
    version,
    about = "Scenario verification loop for scaffolded projects"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the verification loop and persist its report.
    Run {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
        /// Seed defaults from a named profile; explicit flags win.
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// JSON role configuration; absent means all roles builtin.
        #[arg(long)]
        role_config: Option<PathBuf>,
        /// Informational branch name; resolved from git when omitted.
        #[arg(long, default_value = "")]
        branch: String,
        #[arg(long)]
        auto_fix: bool,
        #[arg(long)]
        auto_commit: bool,
        /// Bounds fix attempts recorded per iteration; 0 means unbounded.
        #[arg(long, default_value_t = 0)]
        budget: u32,
        #[arg(long, default_value_t = 0)]
        seed: i64,
        /// Write per-iteration scenario dumps in addition to role artifacts.
        #[arg(long)]
        verbose_artifacts: bool,
        /// Project self-check command for the default scenario.
        #[arg(long)]
        check_command: Option<String>,
    },
    /// Compare two historical runs by id or report path (delta is B minus A).
    Compare {
        run_a: String,
        run_b: String,
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },
    /// Behavior-baseline operations for regression testing the loop itself.
    Regression {
        #[command(subcommand)]
        action: RegressionAction,
    },
    /// List resolved loop profiles (builtin table plus file overrides).
    Profiles {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },
}

#[derive(Subcommand)]
enum RegressionAction {
    /// Diff a run against the stored baseline; drift exits with code 4.
    Check {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
        #[arg(long, default_value = "standard")]
        profile: String,
        #[arg(long)]
        baseline: Option<PathBuf>,
        /// Run id or report path; defaults to the latest summary.
        #[arg(long)]
        run: Option<String>,
    },
    /// Snapshot a run and store it as the baseline.
    Write {
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
        #[arg(long, default_value = "standard")]
        profile: String,
        #[arg(long)]
        baseline: Option<PathBuf>,
        #[arg(long)]
        run: Option<String>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        if let Some(hint) = failure::hint_for(&err) {
            eprintln!("hint: {hint}");
        }
        std::process::exit(failure::exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            repo_root,
            profile,
            threshold,
            max_iterations,
            mode,
            role_config,
            branch,
            auto_fix,
            auto_commit,
            budget,
            seed,
            verbose_artifacts,
            check_command,
        } => cmd_run(RunArgs {
            repo_root,
            profile,
            threshold,
            max_iterations,
            mode,
            role_config,
            branch,
            auto_fix,
            auto_commit,
            budget,
            seed,
            verbose_artifacts,
            check_command,
        }),
        Command::Compare {
            run_a,
            run_b,
            repo_root,
        } => cmd_compare(&repo_root, &run_a, &run_b),
        Command::Regression { action } => match action {
            RegressionAction::Check {
                repo_root,
                profile,
                baseline,
                run,
            } => cmd_regression_check(&repo_root, &profile, baseline.as_deref(), run.as_deref()),
            RegressionAction::Write {
                repo_root,
                profile,
                baseline,
                run,
            } => cmd_regression_write(&repo_root, &profile, baseline.as_deref(), run.as_deref()),
        },
        Command::Profiles { repo_root } => cmd_profiles(&repo_root),
    }
}

struct RunArgs {
    repo_root: PathBuf,
    profile: Option<String>,
    threshold: Option<f64>,
    max_iterations: Option<u32>,
    mode: Option<Mode>,
    role_config: Option<PathBuf>,
    branch: String,
    auto_fix: bool,
    auto_commit: bool,
    budget: u32,
    seed: i64,
    verbose_artifacts: bool,
    check_command: Option<String>,
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let defaults = Config::default();
    let profile = match &args.profile {
        Some(name) => {
            let profiles = resolve_profiles(&args.repo_root)?;
            Some(profiles.get(name).cloned().ok_or_else(|| {
                Failure::usage(format!("unknown profile {name:?}"))
                    .with_hint("list available profiles with `verifier profiles`")
            })?)
        }
        None => None,
    };

    let cfg = Config {
        threshold: args
            .threshold
            .or(profile.as_ref().map(|p| p.threshold))
            .unwrap_or(defaults.threshold),
        max_iterations: args
            .max_iterations
            .or(profile.as_ref().map(|p| p.max_iterations))
            .unwrap_or(defaults.max_iterations),
        mode: args
            .mode
            .or(profile.as_ref().map(|p| p.mode))
            .unwrap_or(defaults.mode),
        auto_fix: args.auto_fix || profile.as_ref().is_some_and(|p| p.auto_fix),
        repo_root: args.repo_root,
        role_config_path: args.role_config,
        branch: args.branch,
        auto_commit: args.auto_commit,
        budget: args.budget,
        seed: args.seed,
        verbose_artifacts: args.verbose_artifacts,
    };

    let scenario = CommandScenario::new(
        &cfg.repo_root,
        ScenarioDescriptor::default_probe(args.check_command.as_deref()),
    );
    let detector = StepFailureDetector;
    let role_config = load_role_config(cfg.role_config_path.as_deref())?;
    let roles = ConfiguredRoles::new(&role_config);

    let result = run_loop(&cfg, &scenario, &detector, &roles)?;
    write_reports(&cfg.repo_root, &result)?;

    println!(
        "run: id={} mode={} score={:.2}/{:.2} pass={} iterations={} fixes={}",
        result.run_id,
        result.mode.as_str(),
        result.judge.score,
        result.judge.threshold,
        result.judge.pass,
        result.iterations,
        result.fixes_applied.len()
    );
    for finding in &result.findings {
        println!("run: finding [{}] {} ({})", finding.code, finding.message, finding.source);
    }
    Ok(())
}

fn cmd_compare(repo_root: &std::path::Path, run_a: &str, run_b: &str) -> Result<()> {
    let report = compare_runs(repo_root, run_a, run_b)?;
    println!(
        "compare: a={} score={:.2} pass={}",
        report.run_a.run_id, report.run_a.judge.score, report.run_a.judge.pass
    );
    println!(
        "compare: b={} score={:.2} pass={}",
        report.run_b.run_id, report.run_b.judge.score, report.run_b.judge.pass
    );
    println!(
        "compare: delta score={:+.2} pass={:+} findings={:+} iterations={:+} fixes={:+}",
        report.delta.score,
        report.delta.pass_delta,
        report.delta.findings_delta,
        report.delta.iterations_delta,
        report.delta.fixes_applied_delta
    );
    Ok(())
}

fn cmd_regression_check(
    repo_root: &std::path::Path,
    profile: &str,
    baseline: Option<&std::path::Path>,
    run: Option<&str>,
) -> Result<()> {
    let check = check_regression(repo_root, profile, baseline, run)?;
    if check.drifts.is_empty() {
        println!(
            "regression: ok profile={} fingerprint={} baseline={}",
            profile,
            check.fingerprint,
            check.baseline_path.display()
        );
        return Ok(());
    }
    for drift in &check.drifts {
        println!(
            "regression: drift kind={} field={} baseline={} current={}",
            drift.kind.as_str(),
            drift.field,
            drift.baseline,
            drift.current
        );
    }
    Err(Failure::contract_validation(format!(
        "behavior drifted from baseline in {} place(s)",
        check.drifts.len()
    ))
    .with_hint(format!(
        "accept the new behavior with `verifier regression write --profile {profile}`"
    ))
    .into())
}

fn cmd_regression_write(
    repo_root: &std::path::Path,
    profile: &str,
    baseline: Option<&std::path::Path>,
    run: Option<&str>,
) -> Result<()> {
    let (path, written) = write_baseline(repo_root, profile, baseline, run)?;
    println!(
        "regression: wrote profile={} fingerprint={} baseline={}",
        profile,
        written.snapshot.fingerprint(),
        path.display()
    );
    Ok(())
}

fn cmd_profiles(repo_root: &std::path::Path) -> Result<()> {
    let profiles = resolve_profiles(repo_root)?;
    for (name, profile) in profiles {
        println!(
            "profile: {} threshold={:.1} max_iterations={} mode={} auto_fix={}",
            name,
            profile.threshold,
            profile.max_iterations,
            profile.mode.as_str(),
            profile.auto_fix
        );
    }
    Ok(())
}
