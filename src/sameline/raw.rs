use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicU64;
use crate::lock::RawLock;
use crate::relax::Relax;
use crate::tid;

/// The packed lock word: owner identity in the high half, the recursion
/// counter in the low half. A non-zero counter doubles as the held flag,
/// so the free word is all zeros.
const OWNER_SHIFT: u32 = 32;

#[inline(always)]
const fn owner(word: u64) -> u32 {
    (word >> OWNER_SHIFT) as u32
}

#[inline(always)]
const fn count(word: u64) -> u32 {
    word as u32
}

#[inline(always)]
const fn pack(owner: u32, count: u32) -> u64 {
    ((owner as u64) << OWNER_SHIFT) | count as u64
}

/// A reentrant lock packing the owner and the recursion counter into one
/// atomic word on a single cache line.
///
/// Reentry and release are plain stores of the bumped counter; only the
/// initial acquisition needs a compare-and-swap. Suitable when cache line
/// fragmentation costs more than the atomic store on the reentry path, and
/// the natural counterpart to measure [`split`] against.
///
/// Waiters read the counter out of the word as the depth hint for their
/// [`Relax`] policy, so an [`Adaptive`] waiter knows the holder's *current*
/// nesting depth rather than a historical estimate.
///
/// This lock is unfair: a waiting thread may be passed over indefinitely.
///
/// [`split`]: crate::split
/// [`Adaptive`]: crate::relax::Adaptive
pub struct RawMutex<R> {
    state: AtomicU64,
    relax: PhantomData<R>,
}

unsafe impl<R> Send for RawMutex<R> {}
unsafe impl<R> Sync for RawMutex<R> {}

impl<R> RawMutex<R> {
    /// Creates a new unlocked lock.
    pub fn new() -> Self {
        Self { state: AtomicU64::new(pack(0, 0)), relax: PhantomData }
    }
}

impl<R: Relax> RawMutex<R> {
    /// Acquires the lock, driving the relax policy between failed attempts
    /// with the holder's current counter as its depth hint.
    pub fn lock(&self) {
        let mut relax = R::new();
        loop {
            if self.try_lock() {
                return;
            }
            relax.relax(count(self.state.load(Relaxed)));
        }
    }

    /// Attempts to acquire the lock without waiting.
    ///
    /// A failed attempt does not write to the lock word.
    pub fn try_lock(&self) -> bool {
        let me = tid::current().get();
        let word = self.state.load(Relaxed);
        if owner(word) == me {
            debug_assert!(count(word) > 0);
            // Reentry is a plain store: we are the unique owner and the
            // counter only matters to other threads as a hint.
            self.state.store(pack(me, count(word) + 1), Relaxed);
            return true;
        }
        if count(word) > 0 {
            return false;
        }
        debug_assert_eq!(owner(word), 0);
        self.state.compare_exchange(word, pack(me, 1), Acquire, Relaxed).is_ok()
    }

    /// Releases one level of the hold.
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
        let count = count(word);
        debug_assert!(count > 0, "unlock of a lock that is not held");
        if count == 1 {
            // The release is a store, not a read-modify-write: nobody else
            // may write the word while our identity is in it.
            self.state.store(pack(0, 0), Release);
        } else {
            self.state.store(pack(owner(word), count - 1), Relaxed);
        }
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
            .field("count", &count(word))
            .finish()
    }
}

#[cfg(all(not(loom), test))]
mod test {
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
    fn word_returns_to_zero() {
        let lock = RawMutex::new();
        lock.lock();
        lock.lock();
        unsafe {
            lock.unlock();
            lock.unlock();
        }
        assert_eq!(lock.state.load(core::sync::atomic::Ordering::Relaxed), 0);
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
