//! Failure reporting for test routines and harness infrastructure.
//!
//! Condition checks report and keep going so a test can collect every failed
//! expression in one run. Infrastructure failures report and then perform the
//! configured [`FatalAction`].

use std::io::Write;

use parking_lot::Mutex;

use crate::config::{FatalAction, fatal_action};

/// Where a report originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSite {
    pub file: &'static str,
    pub line: u32,
}

impl std::fmt::Display for SourceSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Build a [`SourceSite`] for the current file and line.
#[macro_export]
macro_rules! site {
    () => {
        $crate::report::SourceSite {
            file: file!(),
            line: line!(),
        }
    };
}

/// Sink for failure reports.
pub trait FailureReporter: Send + Sync {
    fn report(&self, site: SourceSite, message: &str);
}

/// Writes `"{site}: {message}"` to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl FailureReporter for StderrReporter {
    fn report(&self, site: SourceSite, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{site}: {message}");
        let _ = err.flush();
    }
}

/// A captured report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub site: SourceSite,
    pub message: String,
}

/// Collects reports in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    records: Mutex<Vec<FailureRecord>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of reports so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, site: SourceSite, message: &str) {
        self.records.lock().push(FailureRecord {
            site,
            message: message.to_string(),
        });
    }
}

/// Report a failed condition. Always returns `false`.
#[cold]
#[inline(never)]
pub fn cond_failure(reporter: &dyn FailureReporter, site: SourceSite, expr: &str) -> bool {
    reporter.report(site, &format!("failed: {expr}"));
    false
}

/// Report a failed condition inside a loop. Always returns `false`.
#[cold]
#[inline(never)]
pub fn cond_idx_failure(
    reporter: &dyn FailureReporter,
    site: SourceSite,
    expr: &str,
    loop_idx: usize,
) -> bool {
    reporter.report(site, &format!("failed: {expr} (loop index {loop_idx})"));
    false
}

/// Report `message` and perform the configured fatal action.
#[cold]
#[inline(never)]
pub fn fatal(reporter: &dyn FailureReporter, site: SourceSite, message: &str) -> ! {
    reporter.report(site, message);
    terminate(fatal_action(), site, message)
}

/// Report `message` with the OS description of `errnum`, then terminate.
#[cold]
#[inline(never)]
pub fn perror_abort(
    reporter: &dyn FailureReporter,
    site: SourceSite,
    message: &str,
    errnum: i32,
) -> ! {
    let os = std::io::Error::from_raw_os_error(errnum);
    fatal(reporter, site, &format!("{message}: {os}"))
}

fn terminate(action: FatalAction, site: SourceSite, message: &str) -> ! {
    match action {
        FatalAction::Abort => std::process::abort(),
        FatalAction::Exit => std::process::exit(1),
        FatalAction::Panic => panic!("fatal harness failure at {site}: {message}"),
    }
}

/// Evaluate a condition; on failure report it to stderr (or to the given
/// reporter) and yield `false`.
#[macro_export]
macro_rules! test_cond {
    ($cond:expr) => {
        $crate::test_cond!(&$crate::report::StderrReporter, $cond)
    };
    ($reporter:expr, $cond:expr) => {{
        let passed: bool = $cond;
        if !passed {
            $crate::report::cond_failure(
                $reporter,
                $crate::site!(),
                concat!("(", stringify!($cond), ")"),
            );
        }
        passed
    }};
}

/// Like [`test_cond!`], tagging the report with a loop index.
#[macro_export]
macro_rules! test_cond_idx {
    ($cond:expr, $idx:expr) => {
        $crate::test_cond_idx!(&$crate::report::StderrReporter, $cond, $idx)
    };
    ($reporter:expr, $cond:expr, $idx:expr) => {{
        let passed: bool = $cond;
        if !passed {
            $crate::report::cond_idx_failure(
                $reporter,
                $crate::site!(),
                concat!("(", stringify!($cond), ")"),
                $idx,
            );
        }
        passed
    }};
}

/// Report an OS error and terminate.
#[macro_export]
macro_rules! perror_abort {
    ($msg:expr, $errnum:expr) => {
        $crate::report::perror_abort(
            &$crate::report::StderrReporter,
            $crate::site!(),
            $msg,
            $errnum,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::set_fatal_action;

    #[test]
    fn passing_condition_reports_nothing() {
        let reporter = RecordingReporter::new();
        let x = 3;
        assert!(crate::test_cond!(&reporter, x == 3));
        assert!(reporter.is_empty());
    }

    #[test]
    fn failing_condition_reports_expression() {
        let reporter = RecordingReporter::new();
        let x = 3;
        assert!(!crate::test_cond!(&reporter, x == 4));
        let records = reporter.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "failed: (x == 4)");
        assert!(records[0].site.file.ends_with("report.rs"));
    }

    #[test]
    #[deny(unused_must_use)]
    fn failing_indexed_condition_reports_index() {
        let reporter = RecordingReporter::new();
        for i in 0..4_usize {
            crate::test_cond_idx!(&reporter, i % 2 == 0, i);
        }
        let records = reporter.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "failed: (i % 2 == 0) (loop index 1)");
        assert_eq!(records[1].message, "failed: (i % 2 == 0) (loop index 3)");
    }

    #[test]
    #[deny(unused_must_use)]
    fn statement_checks_still_yield_the_condition() {
        let reporter = RecordingReporter::new();
        crate::test_cond!(&reporter, 2 > 1);
        crate::test_cond!(&reporter, 1 > 2);
        let passed = crate::test_cond!(&reporter, 3 > 2);
        let failed = crate::test_cond_idx!(&reporter, 2 > 3, 9);
        assert!(passed);
        assert!(!failed);
        let messages: Vec<String> = reporter.records().into_iter().map(|r| r.message).collect();
        assert_eq!(
            messages,
            vec![
                "failed: (1 > 2)".to_string(),
                "failed: (2 > 3) (loop index 9)".to_string(),
            ]
        );
    }

    #[test]
    fn site_display_is_file_colon_line() {
        let site = SourceSite {
            file: "scenario",
            line: 42,
        };
        assert_eq!(site.to_string(), "scenario:42");
    }

    #[test]
    fn fatal_reports_before_panicking() {
        set_fatal_action(FatalAction::Panic);
        let reporter = RecordingReporter::new();
        let site = crate::site!();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            fatal(&reporter, site, "thread spawn failed");
        }));
        assert!(caught.is_err());
        let records = reporter.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "thread spawn failed");
        assert_eq!(records[0].site, site);
    }

    #[test]
    fn perror_appends_os_description() {
        set_fatal_action(FatalAction::Panic);
        let reporter = RecordingReporter::new();
        let expected_os = std::io::Error::from_raw_os_error(11).to_string();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            perror_abort(&reporter, crate::site!(), "pthread_create", 11);
        }));
        assert!(caught.is_err());
        let records = reporter.records();
        assert_eq!(records[0].message, format!("pthread_create: {expected_os}"));
    }
}
