//! Harness runtime configuration.
//!
//! Settings come from the environment and are resolved once per process:
//! - `PLASMA_TEST_FATAL`: what happens after a fatal report.
//!   `abort` (default) terminates via `abort`, `exit` calls `exit(1)`,
//!   `panic` unwinds so in-process tests can observe the fatal path.
//! - `PLASMA_TEST_STACK_SIZE`: worker stack size in bytes (decimal or `0x` hex).
//!   Unset or unparseable means the platform default.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Action taken once a fatal condition has been reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalAction {
    /// Terminate immediately via `abort`, no unwinding.
    #[default]
    Abort,
    /// `exit(1)`: runs process-level exit handlers.
    Exit,
    /// Panic on the reporting thread.
    Panic,
}

impl FatalAction {
    /// Parse from string (case-insensitive). Unknown values map to `Abort`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "exit" | "quit" => Self::Exit,
            "panic" | "unwind" => Self::Panic,
            _ => Self::Abort,
        }
    }

    /// Returns true if the action unwinds instead of ending the process.
    #[must_use]
    pub const fn unwinds(self) -> bool {
        matches!(self, Self::Panic)
    }
}

// 0=unresolved, 1=Abort, 2=Exit, 3=Panic.
static CACHED_FATAL: AtomicU8 = AtomicU8::new(0);

const FATAL_UNRESOLVED: u8 = 0;
const FATAL_ABORT: u8 = 1;
const FATAL_EXIT: u8 = 2;
const FATAL_PANIC: u8 = 3;

fn action_to_u8(action: FatalAction) -> u8 {
    match action {
        FatalAction::Abort => FATAL_ABORT,
        FatalAction::Exit => FATAL_EXIT,
        FatalAction::Panic => FATAL_PANIC,
    }
}

fn u8_to_action(v: u8) -> FatalAction {
    match v {
        FATAL_EXIT => FatalAction::Exit,
        FATAL_PANIC => FatalAction::Panic,
        _ => FatalAction::Abort,
    }
}

/// Configured fatal action (reads `PLASMA_TEST_FATAL` on first call).
#[must_use]
pub fn fatal_action() -> FatalAction {
    let cached = CACHED_FATAL.load(Ordering::Acquire);
    if cached != FATAL_UNRESOLVED {
        return u8_to_action(cached);
    }
    let action = std::env::var("PLASMA_TEST_FATAL")
        .map(|v| FatalAction::from_str_loose(&v))
        .unwrap_or_default();
    // A concurrent resolver or an explicit override may have won the race.
    match CACHED_FATAL.compare_exchange(
        FATAL_UNRESOLVED,
        action_to_u8(action),
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => action,
        Err(existing) => u8_to_action(existing),
    }
}

/// Override the fatal action for the rest of the process.
///
/// Returns the previously effective action.
pub fn set_fatal_action(action: FatalAction) -> FatalAction {
    let previous = fatal_action();
    CACHED_FATAL.store(action_to_u8(action), Ordering::Release);
    previous
}

// usize::MAX = unresolved, 0 = platform default.
static CACHED_STACK: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Parse a byte count in decimal or `0x` hex. Zero is rejected.
#[must_use]
pub fn parse_stack_size(raw: &str) -> Option<usize> {
    let raw = raw.trim().replace('_', "");
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse::<usize>().ok(),
    };
    parsed.filter(|&n| n > 0 && n != usize::MAX)
}

/// Worker stack size from `PLASMA_TEST_STACK_SIZE`, if configured.
#[must_use]
pub fn worker_stack_size() -> Option<usize> {
    let mut cached = CACHED_STACK.load(Ordering::Acquire);
    if cached == usize::MAX {
        cached = std::env::var("PLASMA_TEST_STACK_SIZE")
            .ok()
            .and_then(|v| parse_stack_size(&v))
            .unwrap_or(0);
        CACHED_STACK.store(cached, Ordering::Release);
    }
    (cached != 0).then_some(cached)
}
