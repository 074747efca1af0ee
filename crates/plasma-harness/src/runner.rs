//! Scenario execution engine.

use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::scenarios::{Scenario, ScenarioEnv, ScenarioShape, run_scenario};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Result of one scenario iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub threads: usize,
    pub rounds: usize,
    pub iteration: usize,
    pub passed: bool,
    pub duration_ms: u64,
    pub detail: String,
}

/// Runs scenarios and collects results.
pub struct ScenarioRunner {
    /// Name of the campaign (first component of every trace id).
    pub campaign: String,
    /// Iterations per scenario.
    pub repeat: usize,
    pub env: ScenarioEnv,
}

impl ScenarioRunner {
    /// Create a new runner with the default environment.
    #[must_use]
    pub fn new(campaign: impl Into<String>, repeat: usize) -> Self {
        Self {
            campaign: campaign.into(),
            repeat: repeat.max(1),
            env: ScenarioEnv::default(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: ScenarioEnv) -> Self {
        self.env = env;
        self
    }

    /// Run every `(scenario, shape)` pair `repeat` times, logging a start and
    /// finish entry per iteration.
    ///
    /// The log lock is held only while writing, so a [`JsonlReporter`] sharing
    /// the same emitter can log fatal reports raised mid-scenario.
    ///
    /// [`JsonlReporter`]: crate::structured_log::JsonlReporter
    pub fn run(
        &self,
        plan: &[(Scenario, ScenarioShape)],
        log: &Mutex<LogEmitter>,
    ) -> std::io::Result<Vec<ScenarioResult>> {
        let mut results = Vec::with_capacity(plan.len() * self.repeat);
        for &(scenario, shape) in plan {
            for iteration in 0..self.repeat {
                log.lock().emit_entry(
                    LogEntry::new(String::new(), LogLevel::Info, "scenario_start")
                        .with_campaign(&self.campaign)
                        .with_scenario(scenario.name(), shape.threads, shape.rounds)
                        .with_iteration(iteration),
                )?;

                let result = self.run_one(scenario, shape, iteration);
                let (level, outcome) = if result.passed {
                    (LogLevel::Info, Outcome::Pass)
                } else {
                    (LogLevel::Error, Outcome::Fail)
                };
                log.lock().emit_entry(
                    LogEntry::new(String::new(), level, "scenario_finish")
                        .with_campaign(&self.campaign)
                        .with_scenario(scenario.name(), shape.threads, shape.rounds)
                        .with_iteration(iteration)
                        .with_outcome(outcome)
                        .with_duration_ms(result.duration_ms)
                        .with_details(serde_json::json!({ "detail": result.detail })),
                )?;
                results.push(result);
            }
        }
        log.lock().flush()?;
        Ok(results)
    }

    fn run_one(
        &self,
        scenario: Scenario,
        shape: ScenarioShape,
        iteration: usize,
    ) -> ScenarioResult {
        let started = Instant::now();
        let outcome = run_scenario(scenario, shape, &self.env);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (passed, detail) = match outcome {
            Ok(summary) => (true, summary),
            Err(err) => (false, err.to_string()),
        };
        ScenarioResult {
            scenario,
            threads: shape.threads,
            rounds: shape.rounds,
            iteration,
            passed,
            duration_ms,
            detail,
        }
    }
}

/// Counts of passed and failed results.
#[must_use]
pub fn tally(results: &[ScenarioResult]) -> (usize, usize) {
    let passed = results.iter().filter(|r| r.passed).count();
    (passed, results.len() - passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::validate_log_line;

    #[test]
    fn runner_repeats_each_scenario() {
        let runner = ScenarioRunner::new("unit", 3);
        let (log, _buffer) = LogEmitter::to_buffer("unit", "r1");
        let log = Mutex::new(log);
        let plan = [(Scenario::Doubling, ScenarioShape::new(4, 1))];
        let results = runner.run(&plan, &log).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.iteration).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(tally(&results), (3, 0));
    }

    #[test]
    fn zero_repeat_is_clamped_to_one() {
        let runner = ScenarioRunner::new("unit", 0);
        assert_eq!(runner.repeat, 1);
    }

    #[test]
    fn failure_is_recorded_not_raised() {
        let runner = ScenarioRunner::new("unit", 1);
        let (log, buffer) = LogEmitter::to_buffer("unit", "r2");
        let log = Mutex::new(log);
        let plan = [(Scenario::BarrierSingleRound, ScenarioShape::new(0, 1))];
        let results = runner.run(&plan, &log).unwrap();
        assert_eq!(tally(&results), (0, 1));
        assert!(results[0].detail.contains("invalid argument"));

        let content = buffer.contents();
        let finish = content
            .lines()
            .map(|line| validate_log_line(line, 0).unwrap())
            .find(|entry| entry.event == "scenario_finish")
            .unwrap();
        assert_eq!(finish.outcome, Some(Outcome::Fail));
        assert_eq!(finish.level, LogLevel::Error);
    }

    #[test]
    fn every_log_line_is_schema_valid() {
        let runner = ScenarioRunner::new("unit", 2);
        let (log, buffer) = LogEmitter::to_buffer("unit", "r3");
        let log = Mutex::new(log);
        let plan: Vec<_> = [Scenario::SingleWorker, Scenario::InvalidCapacity]
            .into_iter()
            .map(|s| (s, s.default_shape()))
            .collect();
        runner.run(&plan, &log).unwrap();
        let content = buffer.contents();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8);
        for (i, line) in lines.iter().enumerate() {
            let entry = validate_log_line(line, i + 1).unwrap();
            assert_eq!(entry.campaign.as_deref(), Some("unit"));
            assert_eq!(entry.trace_id, format!("unit::r3::{:03}", i + 1));
        }
    }
}
