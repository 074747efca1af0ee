//! Built-in self-checking scenarios for the barrier and thread-group runner.
//!
//! Each scenario drives the primitives through one contract and collects
//! every failed check through a [`RecordingReporter`], so a failing run lists
//! all broken expressions instead of stopping at the first.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use plasma_sync::report::{FailureReporter, RecordingReporter, StderrReporter};
use plasma_sync::{
    Barrier, SyncError, ThreadGroup, barrier_create, barrier_wait, test_cond,
    test_cond_idx,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("harness: {0}")]
    Sync(#[from] SyncError),
    #[error("{failed} check(s) failed: {detail}")]
    Check { failed: usize, detail: String },
}

/// Catalogue of scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    BarrierSingleRound,
    BarrierMultiRound,
    Doubling,
    SingleWorker,
    CounterStress,
    PhasedCounter,
    InvalidCapacity,
}

impl Scenario {
    pub const ALL: [Self; 7] = [
        Self::BarrierSingleRound,
        Self::BarrierMultiRound,
        Self::Doubling,
        Self::SingleWorker,
        Self::CounterStress,
        Self::PhasedCounter,
        Self::InvalidCapacity,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BarrierSingleRound => "barrier-single-round",
            Self::BarrierMultiRound => "barrier-multi-round",
            Self::Doubling => "doubling",
            Self::SingleWorker => "single-worker",
            Self::CounterStress => "counter-stress",
            Self::PhasedCounter => "phased-counter",
            Self::InvalidCapacity => "invalid-capacity",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::BarrierSingleRound => "k threads wait once; all return, exactly one releaser",
            Self::BarrierMultiRound => "k threads wait for r rounds; generations never mix",
            Self::Doubling => "workers return 2*args[i] in argument order",
            Self::SingleWorker => "a one-thread run equals a direct call",
            Self::CounterStress => "n threads increment, rendezvous, then all see exactly n",
            Self::PhasedCounter => "group barrier separates increment and verify phases",
            Self::InvalidCapacity => "zero/negative capacities fail with InvalidArgument",
        }
    }

    /// Default (threads, rounds).
    #[must_use]
    pub const fn default_shape(self) -> ScenarioShape {
        match self {
            Self::BarrierSingleRound => ScenarioShape::new(8, 1),
            Self::BarrierMultiRound => ScenarioShape::new(8, 16),
            Self::Doubling => ScenarioShape::new(4, 1),
            Self::SingleWorker | Self::InvalidCapacity => ScenarioShape::new(1, 1),
            Self::CounterStress => ScenarioShape::new(100, 1),
            Self::PhasedCounter => ScenarioShape::new(16, 8),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Threads and rounds a scenario runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioShape {
    pub threads: usize,
    pub rounds: usize,
}

impl ScenarioShape {
    #[must_use]
    pub const fn new(threads: usize, rounds: usize) -> Self {
        Self { threads, rounds }
    }
}

/// How scenarios build their thread groups.
#[derive(Clone)]
pub struct ScenarioEnv {
    pub stack_size: Option<usize>,
    pub fatal_reporter: Arc<dyn FailureReporter>,
}

impl Default for ScenarioEnv {
    fn default() -> Self {
        Self {
            stack_size: None,
            fatal_reporter: Arc::new(StderrReporter),
        }
    }
}

impl ScenarioEnv {
    fn group(&self, threads: usize, scenario: Scenario) -> Result<ThreadGroup, SyncError> {
        let mut group = ThreadGroup::new(threads)?
            .name_prefix(scenario.name())
            .reporter(Arc::clone(&self.fatal_reporter));
        if let Some(bytes) = self.stack_size {
            group = group.stack_size(bytes);
        }
        Ok(group)
    }
}

/// Run one scenario. `Ok` carries a short summary of what was checked.
pub fn run_scenario(
    scenario: Scenario,
    shape: ScenarioShape,
    env: &ScenarioEnv,
) -> Result<String, ScenarioError> {
    let checks = RecordingReporter::new();
    let summary = match scenario {
        Scenario::BarrierSingleRound => barrier_single_round(shape, env, &checks)?,
        Scenario::BarrierMultiRound => barrier_multi_round(shape, env, &checks)?,
        Scenario::Doubling => doubling(shape, env, &checks)?,
        Scenario::SingleWorker => single_worker(env, &checks)?,
        Scenario::CounterStress => counter_stress(shape, env, &checks)?,
        Scenario::PhasedCounter => phased_counter(shape, env, &checks)?,
        Scenario::InvalidCapacity => invalid_capacity(&checks),
    };
    finish(&checks, summary)
}

fn finish(checks: &RecordingReporter, summary: String) -> Result<String, ScenarioError> {
    let records = checks.records();
    if records.is_empty() {
        return Ok(summary);
    }
    let detail = records
        .iter()
        .map(|r| format!("{}: {}", r.site, r.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(ScenarioError::Check {
        failed: records.len(),
        detail,
    })
}

fn barrier_single_round(
    shape: ScenarioShape,
    env: &ScenarioEnv,
    checks: &RecordingReporter,
) -> Result<String, ScenarioError> {
    let k = shape.threads;
    let barrier = Barrier::new(k)?;
    let released = env
        .group(k, Scenario::BarrierSingleRound)?
        .run(|_: ()| barrier_wait(&barrier), vec![(); k])?;
    let releasers = released.iter().filter(|&&r| r).count();
    test_cond!(checks, released.len() == k);
    test_cond!(checks, releasers == 1);
    test_cond!(checks, barrier.generation() == 1);
    Ok(format!("{k} participants, {releasers} releaser"))
}

fn barrier_multi_round(
    shape: ScenarioShape,
    env: &ScenarioEnv,
    checks: &RecordingReporter,
) -> Result<String, ScenarioError> {
    let k = shape.threads;
    let rounds = shape.rounds.max(1);
    let barrier = Barrier::new(k)?;
    let arrivals = AtomicUsize::new(0);

    let releases = env.group(k, Scenario::BarrierMultiRound)?.run(
        |worker: usize| {
            let mut released = 0_usize;
            for round in 1..=rounds {
                arrivals.fetch_add(1, Ordering::SeqCst);
                let result = barrier.wait();
                released += usize::from(result.is_releaser());
                // Everyone counted for this round before anyone left it.
                test_cond_idx!(checks, arrivals.load(Ordering::SeqCst) >= k * round, worker);
                test_cond_idx!(checks, result.generation() == (2 * round - 1) as u64, worker);
                // Second rendezvous keeps round r+1 arrivals out of round r checks.
                barrier.wait();
            }
            released
        },
        (0..k).collect(),
    )?;

    let total: usize = releases.iter().sum();
    test_cond!(checks, total == rounds);
    test_cond!(checks, barrier.generation() == (2 * rounds) as u64);
    Ok(format!("{k} participants x {rounds} rounds, {total} releases"))
}

fn doubling(
    shape: ScenarioShape,
    env: &ScenarioEnv,
    checks: &RecordingReporter,
) -> Result<String, ScenarioError> {
    let group = env.group(shape.threads, Scenario::Doubling)?;
    let args: Vec<i64> = (0..shape.threads as i64).map(|i| i * 7 - 3).collect();
    let results = group.run(|x: i64| x * 2, args.clone())?;
    for (i, (arg, result)) in args.iter().zip(&results).enumerate() {
        test_cond_idx!(checks, *result == arg * 2, i);
    }
    test_cond!(checks, results.len() == args.len());
    Ok(format!("{} results in argument order", results.len()))
}

fn single_worker(env: &ScenarioEnv, checks: &RecordingReporter) -> Result<String, ScenarioError> {
    let routine = |s: &str| s.bytes().map(u64::from).sum::<u64>();
    let direct = routine("rendezvous");
    let threaded = env
        .group(1, Scenario::SingleWorker)?
        .run(routine, vec!["rendezvous"])?;
    test_cond!(checks, threaded == vec![direct]);
    Ok(format!("direct={direct}"))
}

fn counter_stress(
    shape: ScenarioShape,
    env: &ScenarioEnv,
    checks: &RecordingReporter,
) -> Result<String, ScenarioError> {
    let n = shape.threads;
    let group = env.group(n, Scenario::CounterStress)?;
    for iteration in 0..shape.rounds.max(1) {
        let counter = Mutex::new(0_usize);
        let barrier = Barrier::new(n)?;
        let seen = group.run(
            |worker: usize| {
                *counter.lock() += 1;
                barrier.wait();
                let value = *counter.lock();
                test_cond_idx!(checks, value == n, worker);
                value
            },
            (0..n).collect(),
        )?;
        test_cond_idx!(checks, *counter.lock() == n, iteration);
        test_cond_idx!(checks, seen.iter().all(|&v| v == n), iteration);
    }
    Ok(format!("{n} threads, final counter {n}"))
}

fn phased_counter(
    shape: ScenarioShape,
    env: &ScenarioEnv,
    checks: &RecordingReporter,
) -> Result<String, ScenarioError> {
    let n = shape.threads;
    let rounds = shape.rounds.max(1);
    let counter = Mutex::new(0_usize);
    let serial_sections = AtomicUsize::new(0);

    env.group(n, Scenario::PhasedCounter)?.run_phased(
        |ctx, ()| {
            for round in 1..=rounds {
                *counter.lock() += 1;
                if ctx.barrier_wait() {
                    serial_sections.fetch_add(1, Ordering::SeqCst);
                }
                test_cond_idx!(checks, *counter.lock() == n * round, ctx.index());
                ctx.barrier_wait();
            }
        },
        vec![(); n],
    )?;

    let serial = serial_sections.load(Ordering::SeqCst);
    test_cond!(checks, serial == rounds);
    Ok(format!("{n} threads x {rounds} phases, {serial} serial sections"))
}

fn invalid_capacity(checks: &RecordingReporter) -> String {
    let mut rejected = 0;
    for capacity in [0_isize, -1] {
        let err = barrier_create(capacity).err();
        if test_cond_idx!(
            checks,
            err.as_ref().is_some_and(SyncError::is_invalid_argument),
            capacity.unsigned_abs()
        ) {
            rejected += 1;
        }
    }
    let group_err = ThreadGroup::new(0).err();
    test_cond!(
        checks,
        group_err.as_ref().is_some_and(SyncError::is_invalid_argument)
    );
    format!("{rejected} capacities rejected")
}
