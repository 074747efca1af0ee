//! Allocation accounting for leak-checking test builds.
//!
//! Two layers:
//! - [`AllocContext`]: an explicit object handed to the runner, which reports
//!   every bookkeeping buffer it creates (descriptors and join handles).
//! - [`TrackingAllocator`]: a `#[global_allocator]` wrapper that counts every
//!   heap operation of a test binary.
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::new();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Receives allocation events from the harness.
pub trait AllocContext: Send + Sync {
    fn on_alloc(&self, bytes: usize);
    fn on_free(&self, bytes: usize);
}

/// Platform allocator, no accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformAlloc;

impl AllocContext for PlatformAlloc {
    fn on_alloc(&self, _bytes: usize) {}
    fn on_free(&self, _bytes: usize) {}
}

/// Point-in-time allocation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: u64,
    pub frees: u64,
    pub live_bytes: usize,
    pub peak_bytes: usize,
}

impl AllocStats {
    /// Allocations without a matching free.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

#[derive(Debug, Default)]
struct Counters {
    allocations: AtomicU64,
    frees: AtomicU64,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl Counters {
    const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    fn record_alloc(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    fn record_free(&self, bytes: usize) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Counts allocation events reported by the harness.
#[derive(Debug, Default)]
pub struct CountingAlloc {
    counters: Counters,
}

impl CountingAlloc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }

    /// Bytes reported allocated and never freed.
    #[must_use]
    pub fn leaked_bytes(&self) -> usize {
        self.counters.live_bytes.load(Ordering::Relaxed)
    }
}

impl AllocContext for CountingAlloc {
    fn on_alloc(&self, bytes: usize) {
        self.counters.record_alloc(bytes);
    }

    fn on_free(&self, bytes: usize) {
        self.counters.record_free(bytes);
    }
}

/// Reports `bytes` freed to its context when dropped.
struct BufferLease {
    bytes: usize,
    ctx: Arc<dyn AllocContext>,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.ctx.on_free(self.bytes);
    }
}

/// A `Vec` whose backing buffer is reported to an [`AllocContext`].
///
/// Capacity is fixed at creation; pushing beyond it is a bug in the caller.
/// The free is reported when the buffer itself goes away, including through
/// the by-value iterator.
pub struct TrackedVec<T> {
    items: Vec<T>,
    lease: BufferLease,
}

impl<T> TrackedVec<T> {
    pub fn with_capacity(capacity: usize, ctx: Arc<dyn AllocContext>) -> Self {
        let items = Vec::with_capacity(capacity);
        let bytes = items.capacity() * std::mem::size_of::<T>();
        ctx.on_alloc(bytes);
        Self {
            items,
            lease: BufferLease { bytes, ctx },
        }
    }

    pub fn push(&mut self, item: T) {
        debug_assert!(self.items.len() < self.items.capacity());
        self.items.push(item);
    }
}

impl<T> Deref for TrackedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for TrackedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T> IntoIterator for TrackedVec<T> {
    type Item = T;
    type IntoIter = TrackedIntoIter<T>;

    fn into_iter(self) -> TrackedIntoIter<T> {
        TrackedIntoIter {
            inner: self.items.into_iter(),
            _lease: self.lease,
        }
    }
}

/// By-value iterator over a [`TrackedVec`]; owns the tracked buffer.
pub struct TrackedIntoIter<T> {
    inner: std::vec::IntoIter<T>,
    _lease: BufferLease,
}

impl<T> Iterator for TrackedIntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for TrackedIntoIter<T> {}

/// Counting wrapper around a [`GlobalAlloc`], `System` by default.
#[derive(Debug)]
pub struct TrackingAllocator<A = System> {
    inner: A,
    counters: Counters,
    zeroed: AtomicU64,
    reallocs: AtomicU64,
}

impl TrackingAllocator<System> {
    #[must_use]
    pub const fn new() -> Self {
        Self::wrap(System)
    }
}

impl Default for TrackingAllocator<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TrackingAllocator<A> {
    pub const fn wrap(inner: A) -> Self {
        Self {
            inner,
            counters: Counters::new(),
            zeroed: AtomicU64::new(0),
            reallocs: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }

    /// Zero-initialized allocations (the `calloc` path).
    #[must_use]
    pub fn zeroed_allocations(&self) -> u64 {
        self.zeroed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reallocations(&self) -> u64 {
        self.reallocs.load(Ordering::Relaxed)
    }
}

// SAFETY: every method forwards to `inner` with the caller's arguments
// unchanged; the counters never touch the returned memory.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::alloc` requirements.
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            self.counters.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::alloc_zeroed` requirements.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.zeroed.fetch_add(1, Ordering::Relaxed);
            self.counters.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` was returned by this allocator with `layout`.
        unsafe { self.inner.dealloc(ptr, layout) };
        self.counters.record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::realloc` requirements.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            self.reallocs.fetch_add(1, Ordering::Relaxed);
            let old = layout.size();
            if new_size >= old {
                let live =
                    self.counters.live_bytes.fetch_add(new_size - old, Ordering::Relaxed)
                        + (new_size - old);
                self.counters.peak_bytes.fetch_max(live, Ordering::Relaxed);
            } else {
                self.counters
                    .live_bytes
                    .fetch_sub(old - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}
