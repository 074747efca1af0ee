//! Thread-group runner.
//!
//! Spawns one OS thread per argument, runs the same routine on each, joins
//! every worker and returns the results in argument order.
//!
//! ## Lifecycle
//!
//! Per invocation the runner builds one [`WorkerDescriptor`] per worker
//! (index, argument, result slot). The descriptor is lent to exactly one
//! worker thread, which takes the argument and writes the result; the runner
//! reads the slot only after joining that thread, so the join's
//! happens-before edge is the only synchronization the slots need.
//!
//! Spawn failure is a harness failure, not a test failure: it is reported and
//! the configured [`crate::config::FatalAction`] runs. In a phased run the
//! group barrier is abandoned first, so workers that did start are released
//! (by panicking) rather than left waiting for the missing ones. A worker that panics is
//! a test failure: all workers are joined first, then the lowest-index panic
//! is resumed on the caller.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use crate::alloc::{AllocContext, PlatformAlloc, TrackedVec};
use crate::barrier::Barrier;
use crate::config;
use crate::error::SyncError;
use crate::report::{self, FailureReporter, StderrReporter};

/// Default thread-name prefix; workers are named `"{prefix}-{index}"`.
pub const DEFAULT_NAME_PREFIX: &str = "plasma-worker";

/// One worker's argument and result slot.
struct WorkerDescriptor<A, R> {
    index: usize,
    arg: Option<A>,
    result: Option<R>,
}

/// Per-worker view handed to [`ThreadGroup::run_phased`] routines.
#[derive(Debug)]
pub struct WorkerContext<'a> {
    index: usize,
    group_size: usize,
    barrier: &'a Barrier,
}

impl WorkerContext<'_> {
    /// Position of this worker's argument (and result).
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn group_size(&self) -> usize {
        self.group_size
    }

    /// Barrier shared by the whole group (capacity = group size).
    #[must_use]
    pub const fn barrier(&self) -> &Barrier {
        self.barrier
    }

    /// Wait on the group barrier; true if this worker released the round.
    pub fn barrier_wait(&self) -> bool {
        self.barrier.wait().is_releaser()
    }
}

/// Configurable runner for a fixed number of workers.
#[derive(Clone)]
pub struct ThreadGroup {
    threads: usize,
    name_prefix: String,
    stack_size: Option<usize>,
    alloc: Arc<dyn AllocContext>,
    reporter: Arc<dyn FailureReporter>,
}

impl std::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("threads", &self.threads)
            .field("name_prefix", &self.name_prefix)
            .field("stack_size", &self.stack_size)
            .finish_non_exhaustive()
    }
}

impl ThreadGroup {
    /// Runner for `threads` workers. Fails with `InvalidArgument` for zero.
    pub fn new(threads: usize) -> Result<Self, SyncError> {
        if threads < 1 {
            return Err(SyncError::invalid("threads", threads));
        }
        Ok(Self {
            threads,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            stack_size: config::worker_stack_size(),
            alloc: Arc::new(PlatformAlloc),
            reporter: Arc::new(StderrReporter),
        })
    }

    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Worker stack size in bytes; overrides `PLASMA_TEST_STACK_SIZE`.
    #[must_use]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Context that receives the runner's bookkeeping allocations.
    #[must_use]
    pub fn alloc_context(mut self, ctx: Arc<dyn AllocContext>) -> Self {
        self.alloc = ctx;
        self
    }

    /// Reporter used for fatal infrastructure failures.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run `routine(args[i])` on worker `i` and collect the results in order.
    ///
    /// `args.len()` must equal the group size.
    pub fn run<A, R, F>(&self, routine: F, args: Vec<A>) -> Result<Vec<R>, SyncError>
    where
        A: Send,
        R: Send,
        F: Fn(A) -> R + Sync,
    {
        self.check_args(args.len())?;
        Ok(self.execute(args, None, |_, arg| routine(arg)))
    }

    /// Run `routine(arg)` on every worker with one shared argument.
    pub fn run_shared<T, R, F>(&self, routine: F, arg: &T) -> Vec<R>
    where
        T: Sync + ?Sized,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        self.execute(vec![arg; self.threads], None, |_, arg| routine(arg))
    }

    /// Like [`run`](Self::run), but each worker also gets a [`WorkerContext`]
    /// whose barrier spans the whole group.
    pub fn run_phased<A, R, F>(&self, routine: F, args: Vec<A>) -> Result<Vec<R>, SyncError>
    where
        A: Send,
        R: Send,
        F: Fn(&WorkerContext<'_>, A) -> R + Sync,
    {
        self.check_args(args.len())?;
        let barrier = Barrier::new(self.threads)?;
        let group_size = self.threads;
        Ok(self.execute(args, Some(&barrier), |index, arg| {
            let ctx = WorkerContext {
                index,
                group_size,
                barrier: &barrier,
            };
            routine(&ctx, arg)
        }))
    }

    fn check_args(&self, got: usize) -> Result<(), SyncError> {
        if got != self.threads {
            return Err(SyncError::ArgumentCountMismatch {
                expected: self.threads,
                got,
            });
        }
        Ok(())
    }

    /// `group_barrier` is abandoned before a spawn failure turns fatal, so
    /// workers already blocked on it unwind instead of waiting for peers that
    /// will never start.
    fn execute<A, R, F>(
        &self,
        args: Vec<A>,
        group_barrier: Option<&Barrier>,
        routine: F,
    ) -> Vec<R>
    where
        A: Send,
        R: Send,
        F: Fn(usize, A) -> R + Sync,
    {
        let mut descriptors: TrackedVec<WorkerDescriptor<A, R>> =
            TrackedVec::with_capacity(self.threads, Arc::clone(&self.alloc));
        for (index, arg) in args.into_iter().enumerate() {
            descriptors.push(WorkerDescriptor {
                index,
                arg: Some(arg),
                result: None,
            });
        }

        let routine = &routine;
        let panics: Vec<Option<Box<dyn Any + Send>>> = thread::scope(|scope| {
            let mut handles = TrackedVec::with_capacity(self.threads, Arc::clone(&self.alloc));
            for desc in descriptors.iter_mut() {
                let index = desc.index;
                let mut builder =
                    thread::Builder::new().name(format!("{}-{index}", self.name_prefix));
                if let Some(bytes) = self.stack_size {
                    builder = builder.stack_size(bytes);
                }
                let spawned = builder.spawn_scoped(scope, move || {
                    if let Some(arg) = desc.arg.take() {
                        desc.result = Some(routine(desc.index, arg));
                    }
                });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        if let Some(barrier) = group_barrier {
                            barrier.abandon();
                        }
                        report::fatal(
                            &*self.reporter,
                            crate::site!(),
                            &format!(
                                "failed to spawn worker {index} of {}: {err}",
                                self.threads
                            ),
                        )
                    }
                }
            }
            handles
                .into_iter()
                .map(|handle| handle.join().err())
                .collect()
        });

        if let Some(payload) = panics.into_iter().flatten().next() {
            std::panic::resume_unwind(payload);
        }

        descriptors
            .into_iter()
            .filter_map(|desc| desc.result)
            .collect()
    }
}

/// Run `routine(args[i])` on `args.len()` fresh threads and return the
/// results in argument order. An empty `args` fails with `InvalidArgument`.
pub fn run_threads<A, R, F>(routine: F, args: Vec<A>) -> Result<Vec<R>, SyncError>
where
    A: Send,
    R: Send,
    F: Fn(A) -> R + Sync,
{
    ThreadGroup::new(args.len())?.run(routine, args)
}
