//! Scenario harness for plasma-sync.
//!
//! This crate provides:
//! - Scenarios: self-checking uses of the barrier and thread-group runner
//! - Runner: repeat scenarios and collect pass/fail results
//! - Structured logging: JSONL records for every scenario iteration and
//!   every fatal failure report

#![forbid(unsafe_code)]

pub mod runner;
pub mod scenarios;
pub mod structured_log;

pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::{Scenario, ScenarioEnv, ScenarioError, ScenarioShape};
