//! # plasma-sync
//!
//! Concurrency primitives for multi-thread test scenarios:
//! - [`Barrier`]: reusable, generation-tagged rendezvous for a fixed number of
//!   participants, reporting which caller released each round.
//! - [`ThreadGroup`] / [`run_threads`]: spawn one worker per argument, join all
//!   of them, return results in argument order.
//! - [`alloc`]: allocation accounting hooks for leak-checking builds.
//! - [`report`]: condition-failure and fatal-error reporting.
//! - [`config`]: environment-driven harness settings.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod alloc;
pub mod barrier;
pub mod config;
pub mod error;
pub mod group;
pub mod report;

pub use alloc::{AllocContext, AllocStats, CountingAlloc, PlatformAlloc, TrackingAllocator};
pub use barrier::{Barrier, BarrierWaitResult, barrier_create, barrier_wait};
pub use config::FatalAction;
pub use error::SyncError;
pub use group::{ThreadGroup, WorkerContext, run_threads};
pub use report::{FailureReporter, RecordingReporter, SourceSite, StderrReporter};
