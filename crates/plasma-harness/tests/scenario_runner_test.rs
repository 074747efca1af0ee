//! Integration test: scenario catalogue and runner.
//!
//! Validates that:
//! 1. Every built-in scenario passes at its default shape.
//! 2. Scenario names round-trip through `from_name` and serde.
//! 3. Shape overrides reach the primitives (zero threads fails cleanly).
//! 4. A repeated run logs a start and finish entry per iteration.
//! 5. Results serialize to JSON with kebab-case scenario names.
//!
//! Run: cargo test -p plasma-harness --test scenario_runner_test

use parking_lot::Mutex;
use plasma_harness::runner::{ScenarioRunner, tally};
use plasma_harness::scenarios::{Scenario, ScenarioEnv, ScenarioShape, run_scenario};
use plasma_harness::structured_log::{LogEmitter, Outcome, validate_log_line};

#[test]
fn every_scenario_passes_at_default_shape() {
    let env = ScenarioEnv::default();
    for scenario in Scenario::ALL {
        let outcome = run_scenario(scenario, scenario.default_shape(), &env);
        assert!(outcome.is_ok(), "{scenario} failed: {:?}", outcome.err());
    }
}

#[test]
fn scenario_names_are_stable() {
    for scenario in Scenario::ALL {
        assert_eq!(Scenario::from_name(scenario.name()), Some(scenario));
        let json = serde_json::to_string(&scenario).unwrap();
        assert_eq!(json, format!("\"{}\"", scenario.name()));
    }
    assert_eq!(
        Scenario::from_name("Counter_Stress"),
        Some(Scenario::CounterStress)
    );
    assert_eq!(Scenario::from_name("no-such-scenario"), None);
}

#[test]
fn larger_shapes_still_pass() {
    let env = ScenarioEnv {
        stack_size: Some(256 * 1024),
        ..ScenarioEnv::default()
    };
    for (scenario, shape) in [
        (Scenario::BarrierMultiRound, ScenarioShape::new(12, 40)),
        (Scenario::CounterStress, ScenarioShape::new(64, 1)),
        (Scenario::PhasedCounter, ScenarioShape::new(24, 5)),
        (Scenario::Doubling, ScenarioShape::new(33, 1)),
    ] {
        let outcome = run_scenario(scenario, shape, &env);
        assert!(outcome.is_ok(), "{scenario} {shape:?}: {:?}", outcome.err());
    }
}

#[test]
fn zero_threads_fails_with_invalid_argument() {
    let env = ScenarioEnv::default();
    let err = run_scenario(Scenario::CounterStress, ScenarioShape::new(0, 1), &env).unwrap_err();
    assert!(err.to_string().contains("invalid argument"), "{err}");
}

#[test]
fn repeated_run_logs_every_iteration() {
    let (emitter, buffer) = LogEmitter::to_buffer("integ", "run-1");
    let log = Mutex::new(emitter);
    let runner = ScenarioRunner::new("integ", 3);
    let plan = [
        (Scenario::BarrierSingleRound, ScenarioShape::new(4, 1)),
        (Scenario::Doubling, ScenarioShape::new(4, 1)),
    ];
    let results = runner.run(&plan, &log).unwrap();
    assert_eq!(results.len(), 6);
    assert_eq!(tally(&results), (6, 0));

    let content = buffer.contents();
    let entries: Vec<_> = content
        .lines()
        .enumerate()
        .map(|(i, line)| validate_log_line(line, i + 1).unwrap())
        .collect();
    assert_eq!(entries.len(), 12);
    let finishes: Vec<_> = entries
        .iter()
        .filter(|e| e.event == "scenario_finish")
        .collect();
    assert_eq!(finishes.len(), 6);
    assert!(finishes.iter().all(|e| e.outcome == Some(Outcome::Pass)));
    assert_eq!(
        finishes
            .iter()
            .map(|e| (e.scenario.as_deref().unwrap(), e.iteration.unwrap()))
            .collect::<Vec<_>>(),
        vec![
            ("barrier-single-round", 0),
            ("barrier-single-round", 1),
            ("barrier-single-round", 2),
            ("doubling", 0),
            ("doubling", 1),
            ("doubling", 2),
        ]
    );
}

#[test]
fn results_serialize_with_scenario_names() {
    let (emitter, _buffer) = LogEmitter::to_buffer("integ", "run-2");
    let log = Mutex::new(emitter);
    let runner = ScenarioRunner::new("integ", 1);
    let results = runner
        .run(&[(Scenario::SingleWorker, ScenarioShape::new(1, 1))], &log)
        .unwrap();
    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json[0]["scenario"], "single-worker");
    assert_eq!(json[0]["threads"], 1);
    assert_eq!(json[0]["passed"], true);
}
