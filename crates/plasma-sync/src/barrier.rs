//! Reusable rendezvous barrier with generation tagging.
//!
//! A round completes when `capacity` participants have called [`Barrier::wait`].
//! The arrival that completes the round is the releaser: it resets the arrival
//! count, advances the generation and wakes everyone blocked in that round.
//! Waiters sleep on a condition variable until the generation they entered
//! with is gone, so a participant that re-enters immediately after release is
//! always counted toward the next round.

use parking_lot::{Condvar, Mutex};

use crate::error::SyncError;

/// Round state guarded by the barrier lock.
#[derive(Debug, Default)]
struct RoundState {
    /// Participants currently blocked in this round. Always `< capacity`
    /// when observed outside `wait`.
    arrived: usize,
    /// Completed rounds.
    generation: u64,
    /// Set once the group feeding this barrier can no longer fill a round.
    abandoned: bool,
}

/// Outcome of a single [`Barrier::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    releaser: bool,
    generation: u64,
}

impl BarrierWaitResult {
    /// True for exactly one participant per round: the one whose arrival
    /// reached capacity.
    #[must_use]
    pub const fn is_releaser(&self) -> bool {
        self.releaser
    }

    /// Generation the caller was released into (rounds completed, including
    /// the one just released).
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Generation-counting barrier for a fixed number of participants.
#[derive(Debug)]
pub struct Barrier {
    capacity: usize,
    state: Mutex<RoundState>,
    released: Condvar,
}

impl Barrier {
    /// Create a barrier for `capacity` participants per round.
    ///
    /// Fails with `InvalidArgument` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, SyncError> {
        if capacity < 1 {
            return Err(SyncError::invalid("capacity", capacity));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(RoundState::default()),
            released: Condvar::new(),
        })
    }

    /// Participants required per round.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of rounds released so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Arrive at the barrier and block until the round completes.
    ///
    /// Every participant must call this the same number of times; an extra
    /// call blocks forever.
    ///
    /// # Panics
    ///
    /// Panics if the barrier was abandoned by its thread group, either on
    /// entry or while blocked.
    pub fn wait(&self) -> BarrierWaitResult {
        let mut state = self.state.lock();
        if state.abandoned {
            drop(state);
            abandoned_panic();
        }
        let entered = state.generation;
        state.arrived += 1;

        if state.arrived == self.capacity {
            state.arrived = 0;
            state.generation = entered.wrapping_add(1);
            let generation = state.generation;
            drop(state);
            self.released.notify_all();
            return BarrierWaitResult {
                releaser: true,
                generation,
            };
        }

        // Spurious wakeups re-check the generation captured on entry.
        while state.generation == entered {
            if state.abandoned {
                drop(state);
                abandoned_panic();
            }
            self.released.wait(&mut state);
        }
        // Later rounds may already have completed by the time this waiter
        // runs again; report the round it actually took part in.
        BarrierWaitResult {
            releaser: false,
            generation: entered.wrapping_add(1),
        }
    }

    /// Wake every blocked participant and make current and future waits
    /// panic. Used when a group member could not be started.
    pub(crate) fn abandon(&self) {
        self.state.lock().abandoned = true;
        self.released.notify_all();
    }
}

#[cold]
fn abandoned_panic() -> ! {
    panic!("barrier abandoned: a participant of the group never started")
}

/// Create a barrier from a signed participant count.
///
/// Zero and negative counts fail with `InvalidArgument`.
pub fn barrier_create(capacity: isize) -> Result<Barrier, SyncError> {
    let capacity =
        usize::try_from(capacity).map_err(|_| SyncError::invalid("capacity", capacity))?;
    Barrier::new(capacity)
}

/// Wait on `barrier`; returns true if this caller released the round.
pub fn barrier_wait(barrier: &Barrier) -> bool {
    barrier.wait().is_releaser()
}
