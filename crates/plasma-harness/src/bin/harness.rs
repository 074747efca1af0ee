//! CLI for running plasma-sync scenarios and validating their logs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use plasma_harness::runner::{ScenarioRunner, tally};
use plasma_harness::scenarios::{Scenario, ScenarioEnv, ScenarioShape};
use plasma_harness::structured_log::{JsonlReporter, LogEmitter, validate_log_file};

/// Barrier and thread-group scenario harness.
#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Run plasma-sync scenarios and validate their JSONL logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List available scenarios with their default shapes.
    List,
    /// Run one scenario or all of them.
    Run {
        /// Scenario name, or `all`.
        #[arg(long, default_value = "all")]
        scenario: String,
        /// Override the scenario's default thread count.
        #[arg(long)]
        threads: Option<usize>,
        /// Override the scenario's default round count.
        #[arg(long)]
        rounds: Option<usize>,
        /// Iterations per scenario.
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// JSONL log output path (stdout when omitted).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Campaign name used in trace ids.
        #[arg(long, default_value = "harness")]
        campaign: String,
        /// Worker stack size in bytes.
        #[arg(long)]
        stack_size: Option<usize>,
    },
    /// Validate a JSONL log file against the log schema.
    ValidateLog {
        /// Path to the log file.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            for scenario in Scenario::ALL {
                let shape = scenario.default_shape();
                println!(
                    "{:<22} threads={:<4} rounds={:<4} {}",
                    scenario.name(),
                    shape.threads,
                    shape.rounds,
                    scenario.description()
                );
            }
        }
        Command::Run {
            scenario,
            threads,
            rounds,
            repeat,
            log,
            campaign,
            stack_size,
        } => {
            let selected: Vec<Scenario> = if scenario.eq_ignore_ascii_case("all") {
                Scenario::ALL.to_vec()
            } else {
                let Some(one) = Scenario::from_name(&scenario) else {
                    return Err(format!("unknown scenario: {scenario}").into());
                };
                vec![one]
            };
            let plan: Vec<(Scenario, ScenarioShape)> = selected
                .into_iter()
                .map(|s| {
                    let default = s.default_shape();
                    let shape = ScenarioShape::new(
                        threads.unwrap_or(default.threads),
                        rounds.unwrap_or(default.rounds),
                    );
                    (s, shape)
                })
                .collect();

            let run_id = format!("pid{}", std::process::id());
            let emitter = match &log {
                Some(path) => LogEmitter::to_file(path, &campaign, &run_id)?,
                None => LogEmitter::to_stdout(&campaign, &run_id),
            };
            let emitter = Arc::new(Mutex::new(emitter));

            let mut env = ScenarioEnv {
                stack_size,
                ..ScenarioEnv::default()
            };
            if log.is_some() {
                env.fatal_reporter = Arc::new(JsonlReporter::new(Arc::clone(&emitter)));
            }

            eprintln!(
                "Running {} scenario(s) x{} (campaign {campaign})...",
                plan.len(),
                repeat.max(1)
            );
            let runner = ScenarioRunner::new(&campaign, repeat).with_env(env);
            let results = runner.run(&plan, &emitter)?;

            for result in results.iter().filter(|r| !r.passed) {
                eprintln!(
                    "FAIL {} [threads={} rounds={} iteration={}]: {}",
                    result.scenario, result.threads, result.rounds, result.iteration, result.detail
                );
            }
            let (passed, failed) = tally(&results);
            eprintln!("Scenarios: {passed} passed, {failed} failed");
            if let Some(path) = &log {
                eprintln!("Log written to {}", path.display());
            }
            if failed > 0 {
                return Err(format!("{failed} scenario iteration(s) failed").into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            if errors.is_empty() {
                eprintln!("{}: {lines} line(s) valid", log.display());
            } else {
                for error in &errors {
                    eprintln!("{error}");
                }
                return Err(format!(
                    "{}: {} validation error(s) across {lines} line(s)",
                    log.display(),
                    errors.len()
                )
                .into());
            }
        }
    }

    Ok(())
}
