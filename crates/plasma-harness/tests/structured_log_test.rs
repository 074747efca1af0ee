//! Integration test: structured logging contract.
//!
//! Validates that:
//! 1. LogEmitter writes schema-valid JSONL to files.
//! 2. validate_log_file counts lines and reports per-line errors.
//! 3. JsonlReporter entries written through a shared emitter are valid.
//!
//! Run: cargo test -p plasma-harness --test structured_log_test

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use plasma_harness::runner::ScenarioRunner;
use plasma_harness::scenarios::{Scenario, ScenarioShape};
use plasma_harness::structured_log::{
    JsonlReporter, LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file,
};
use plasma_sync::report::{FailureReporter, SourceSite};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plasma_log_test_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn emitter_writes_valid_jsonl_file() {
    let dir = scratch_dir("emit");
    let log_path = dir.join("emit.jsonl");
    {
        let mut emitter = LogEmitter::to_file(&log_path, "integ", "run-file").unwrap();
        emitter.emit(LogLevel::Info, "campaign_start").unwrap();
        emitter
            .emit_entry(
                LogEntry::new("", LogLevel::Info, "scenario_finish")
                    .with_scenario("doubling", 4, 1)
                    .with_outcome(Outcome::Pass)
                    .with_duration_ms(1),
            )
            .unwrap();
        emitter.flush().unwrap();
    }

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 2);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let content = std::fs::read_to_string(&log_path).unwrap();
    let last: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
    assert_eq!(last["trace_id"], "integ::run-file::002");
    assert_eq!(last["campaign"], "integ");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_log_file_reports_bad_lines() {
    let dir = scratch_dir("bad");
    let log_path = dir.join("bad.jsonl");
    let good = LogEntry::new("a::b::001", LogLevel::Info, "ok")
        .to_jsonl()
        .unwrap();
    let body = format!("{good}\n\nnot json\n{{\"level\":\"info\"}}\n");
    std::fs::write(&log_path, body).unwrap();

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 3);
    assert!(errors.iter().any(|e| e.line_number == 3 && e.field == "<json>"));
    assert!(errors.iter().any(|e| e.line_number == 4 && e.field == "timestamp"));
    assert!(errors.iter().all(|e| e.line_number != 1));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn runner_and_reporter_share_one_file() {
    let dir = scratch_dir("shared");
    let log_path = dir.join("shared.jsonl");
    let emitter = Arc::new(Mutex::new(
        LogEmitter::to_file(&log_path, "integ", "run-shared").unwrap(),
    ));
    let reporter = JsonlReporter::new(Arc::clone(&emitter));

    let runner = ScenarioRunner::new("integ", 1);
    runner
        .run(&[(Scenario::Doubling, ScenarioShape::new(2, 1))], &emitter)
        .unwrap();
    reporter.report(
        SourceSite {
            file: "group.rs",
            line: 7,
        },
        "failed to spawn worker 0 of 2",
    );

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 3);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let content = std::fs::read_to_string(&log_path).unwrap();
    let fatal: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
    assert_eq!(fatal["level"], "fatal");
    assert_eq!(fatal["event"], "failure_report");
    assert_eq!(fatal["site"], "group.rs:7");
    assert_eq!(fatal["trace_id"], "integ::run-shared::003");
    let _ = std::fs::remove_dir_all(&dir);
}
