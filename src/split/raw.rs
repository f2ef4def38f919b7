use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crossbeam_utils::CachePadded;

use crate::cfg::atomic::AtomicU64;
use crate::lock::RawLock;
use crate::relax::Relax;
use crate::tid;

/// The packed lock word: owner identity in the high half, a held bit and a
/// 31-bit recursion metric in the low half.
const OWNER_SHIFT: u32 = 32;
const HELD: u64 = 1 << 31;
const METRIC_MASK: u64 = HELD - 1;

#[inline(always)]
const fn owner(word: u64) -> u32 {
    (word >> OWNER_SHIFT) as u32
}

#[inline(always)]
const fn metric(word: u64) -> u32 {
    (word & METRIC_MASK) as u32
}

#[inline(always)]
const fn is_held(word: u64) -> bool {
    word & HELD != 0
}

#[inline(always)]
const fn held(owner: u32, metric: u32) -> u64 {
    ((owner as u64) << OWNER_SHIFT) | HELD | metric as u64
}

#[inline(always)]
const fn free(metric: u32) -> u64 {
    metric as u64
}

/// The holder's recursion bookkeeping: current nesting depth and the
/// deepest nesting reached during this hold. Only the thread that owns the
/// lock reads or writes these, so they are plain cells.
struct Counters {
    depth: Cell<u64>,
    max: Cell<u64>,
}

/// A reentrant lock whose atomic word and recursion counter live on
/// separate cache lines.
///
/// The word holds the owner's identity, a held bit and the recursion
/// metric: a running estimate of how deeply holders nest, fed by each
/// release with half the departing holder's deepest nesting. Waiters read
/// the metric as the depth hint for their [`Relax`] policy; an [`Adaptive`]
/// waiter will sleep instead of spin when history says holders go deep.
///
/// Reentry never touches the atomic word: it bumps the holder-owned counter
/// on the other cache line, so nested acquisitions stay invisible to other
/// cores.
///
/// This lock is unfair: a waiting thread may be passed over indefinitely.
///
/// [`Adaptive`]: crate::relax::Adaptive
pub struct RawMutex<R> {
    state: CachePadded<AtomicU64>,
    counters: CachePadded<Counters>,
    relax: PhantomData<R>,
}

// SAFETY: the counter cells are only ever accessed by the thread whose
// identity is in the lock word, which the protocol makes unique.
unsafe impl<R> Send for RawMutex<R> {}
unsafe impl<R> Sync for RawMutex<R> {}

impl<R> RawMutex<R> {
    /// Creates a new unlocked lock.
    pub fn new() -> Self {
        let counters = Counters { depth: Cell::new(0), max: Cell::new(0) };
        Self {
            state: CachePadded::new(AtomicU64::new(free(0))),
            counters: CachePadded::new(counters),
            relax: PhantomData,
        }
    }

    /// The recursion metric currently published in the lock word.
    #[cfg(all(not(loom), test))]
    pub(crate) fn recursion_metric(&self) -> u32 {
        metric(self.state.load(Relaxed))
    }
}

impl<R: Relax> RawMutex<R> {
    /// Acquires the lock, driving the relax policy between failed attempts
    /// with the published recursion metric as its depth hint.
    pub fn lock(&self) {
        let mut relax = R::new();
        loop {
            if self.try_lock() {
                return;
            }
            relax.relax(metric(self.state.load(Relaxed)));
        }
    }

    /// Attempts to acquire the lock without waiting.
    ///
    /// A failed attempt does not write to the lock word.
    pub fn try_lock(&self) -> bool {
        let me = tid::current().get();
        let word = self.state.load(Relaxed);
        if owner(word) == me {
            // Reentry: the word already carries our identity and nobody
            // else may touch the counters while it does.
            let depth = self.counters.depth.get() + 1;
            self.counters.depth.set(depth);
            if depth > self.counters.max.get() {
                self.counters.max.set(depth);
            }
            return true;
        }
        if is_held(word) {
            return false;
        }
        let desired = held(me, metric(word));
        if self.state.compare_exchange(word, desired, Acquire, Relaxed).is_ok() {
            self.counters.depth.set(1);
            self.counters.max.set(1);
            true
        } else {
            false
        }
    }

    /// Releases one level of the hold.
    ///
    /// The final release folds half the deepest nesting of this hold into
    /// the recursion metric and publishes the freed word.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock.
    pub unsafe fn unlock(&self) {
        let word = self.state.load(Relaxed);
        debug_assert_eq!(
            owner(word),
            tid::current().get(),
            "unlock of a lock held by another thread"
        );
        let depth = self.counters.depth.get();
        debug_assert!(depth > 0, "unlock of a lock that is not held");
        self.counters.depth.set(depth - 1);
        if depth > 1 {
            return;
        }
        let estimate = u64::from(metric(word)) + self.counters.max.get() / 2;
        // A plain store suffices: we are the unique owner until this word
        // lands, and the metric field saturates instead of spilling into
        // the held bit.
        self.state.store(free(estimate.min(METRIC_MASK) as u32), Release);
    }
}

unsafe impl<R: Relax> RawLock for RawMutex<R> {
    fn new() -> Self {
        Self::new()
    }

    #[inline]
    fn lock(&self) {
        self.lock();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_lock()
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: forwarded caller contract.
        unsafe { self.unlock() }
    }
}

impl<R: Relax> Default for RawMutex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Debug for RawMutex<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let word = self.state.load(Relaxed);
        f.debug_struct("RawMutex")
            .field("owner", &owner(word))
            .field("held", &is_held(word))
            .field("metric", &metric(word))
            .finish()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::sync::atomic::Ordering::Relaxed;
    use std::thread;

    use crate::relax::Yield;
    use crate::test::tests;

    type RawMutex = super::RawMutex<Yield>;

    #[test]
    fn reentrant_same_thread() {
        tests::reentrant_same_thread::<RawMutex>();
    }

    #[test]
    fn deep_nesting() {
        tests::deep_nesting::<RawMutex>();
    }

    #[test]
    fn exclusion_two_threads() {
        tests::exclusion_two_threads::<RawMutex>();
    }

    #[test]
    fn reentrant_exclusion() {
        tests::reentrant_exclusion::<RawMutex>();
    }

    #[test]
    fn lots_and_lots_lock() {
        tests::lots_and_lots_lock::<RawMutex>();
    }

    #[test]
    fn contention_many_threads() {
        tests::contention_many_threads::<RawMutex>();
    }

    #[test]
    fn release_feeds_the_metric() {
        let lock = RawMutex::new();
        for _ in 0..8 {
            lock.lock();
        }
        for _ in 0..8 {
            unsafe { lock.unlock() };
        }
        // Half of the deepest nesting of the departing holder.
        assert!(lock.recursion_metric() >= 4);
    }

    #[test]
    fn failed_try_leaves_the_word_untouched() {
        let lock = Arc::new(RawMutex::new());
        let c_lock = Arc::clone(&lock);
        let (held_tx, held_rx) = channel();
        let (done_tx, done_rx) = channel();
        let holder = thread::spawn(move || {
            c_lock.lock();
            held_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            unsafe { c_lock.unlock() };
        });
        held_rx.recv().unwrap();

        let before = lock.state.load(Relaxed);
        assert!(!lock.try_lock());
        assert_eq!(lock.state.load(Relaxed), before);

        done_tx.send(()).unwrap();
        holder.join().unwrap();
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;
    use crate::relax::Yield;

    type RawMutex = super::RawMutex<Yield>;

    #[test]
    fn lock_join() {
        models::lock_join::<RawMutex>();
    }

    #[test]
    fn reentrant_lock_join() {
        models::reentrant_lock_join::<RawMutex>();
    }
}
