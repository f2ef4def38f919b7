use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicPtr;
use crate::cfg::hint;
use crate::lock::RawLock;
use crate::relax::Relax;

use super::node::{self, Node};

/// The head's `waiting` value: the lock is this node's to take.
const UNLOCKED: u32 = 0;

/// The baseline `waiting` value of an enqueued node. In the depth
/// broadcasting variant, values above it carry the holder's current
/// recursion depth.
const WAITING: u32 = 1;

#[inline(always)]
fn as_waiting(depth: u64) -> u32 {
    u32::try_from(depth).unwrap_or(u32::MAX)
}

/// A reentrant MCS queue lock.
///
/// Threads acquire the lock in the order their enqueue on the tail pointer
/// succeeded, each spinning on a flag in its own locally-accessible node
/// rather than on the shared lock word. Reentry by the holder is purely
/// thread-local and never requeues.
///
/// With `ADAPTIVE` set, the holder broadcasts its current recursion depth
/// into its successor's wait flag on every nested acquisition and release.
/// The successor's [`Relax`] policy receives that depth as its hint and may
/// sleep out a deeply nested holder instead of burning its time slice; see
/// [`Adaptive`]. Without `ADAPTIVE`, the flag only ever distinguishes
/// "wait" from "go".
///
/// [`Adaptive`]: crate::relax::Adaptive
pub struct RawMutex<R, const ADAPTIVE: bool = false> {
    tail: AtomicPtr<Node>,
    relax: PhantomData<R>,
}

unsafe impl<R, const ADAPTIVE: bool> Send for RawMutex<R, ADAPTIVE> {}
unsafe impl<R, const ADAPTIVE: bool> Sync for RawMutex<R, ADAPTIVE> {}

impl<R, const ADAPTIVE: bool> RawMutex<R, ADAPTIVE> {
    /// Creates a new unlocked lock.
    pub fn new() -> Self {
        Self { tail: AtomicPtr::new(ptr::null_mut()), relax: PhantomData }
    }

    /// This thread's node for this lock.
    ///
    /// The returned reference is only ever used within a single locking
    /// operation, far outlived by the thread-local registry slot backing it.
    fn node(&self) -> &Node {
        let ptr = node::of(self as *const Self as usize);
        // SAFETY: the registry keeps the node alive until the thread exits,
        // and hands the same node back to this thread only.
        unsafe { ptr.as_ref() }
    }

    /// Publishes `depth` into the successor's wait flag, if a successor has
    /// linked itself in. Storing zero is the lock handoff itself.
    fn broadcast(node: &Node, depth: u64) {
        let next = node.next.load(Acquire);
        if !next.is_null() {
            // SAFETY: a linked successor is parked in its own `lock` call,
            // which keeps its node alive at least until we store zero here.
            unsafe { &*next }.waiting.store(as_waiting(depth), Release);
        }
    }
}

impl<R: Relax, const ADAPTIVE: bool> RawMutex<R, ADAPTIVE> {
    /// Acquires the lock, enqueueing behind the current tail and spinning
    /// on this thread's own node until handed the lock.
    pub fn lock(&self) {
        let node = self.node();
        let depth = node.depth.get();
        if depth > 0 {
            // Reentry never touches the queue.
            node.depth.set(depth + 1);
            if ADAPTIVE {
                Self::broadcast(node, depth + 1);
            }
            return;
        }
        node.depth.set(1);
        node.next.store(ptr::null_mut(), Relaxed);
        node.waiting.store(WAITING, Relaxed);
        let this = ptr::from_ref(node).cast_mut();
        let pred = self.tail.swap(this, AcqRel);
        if pred.is_null() {
            // Uncontended: we are the queue head.
            node.waiting.store(UNLOCKED, Relaxed);
            return;
        }
        // SAFETY: the predecessor cannot finish releasing (and so cannot
        // retire its node) before our link below becomes visible to it.
        unsafe { &*pred }.next.store(this, Release);
        let mut relax = R::new();
        loop {
            let waiting = node.waiting.load(Acquire);
            if waiting == UNLOCKED {
                return;
            }
            relax.relax(waiting);
        }
    }

    /// Attempts to acquire the lock without waiting.
    ///
    /// Succeeds on reentry and on an empty queue; any sign of contention
    /// resets this thread's node and reports failure without enqueueing.
    pub fn try_lock(&self) -> bool {
        let node = self.node();
        let depth = node.depth.get();
        if depth > 0 {
            node.depth.set(depth + 1);
            if ADAPTIVE {
                Self::broadcast(node, depth + 1);
            }
            return true;
        }
        node.depth.set(1);
        node.next.store(ptr::null_mut(), Relaxed);
        node.waiting.store(WAITING, Relaxed);
        let this = ptr::from_ref(node).cast_mut();
        if self.tail.load(Relaxed).is_null()
            && self
                .tail
                .compare_exchange(ptr::null_mut(), this, AcqRel, Relaxed)
                .is_ok()
        {
            node.waiting.store(UNLOCKED, Relaxed);
            return true;
        }
        node.depth.set(0);
        false
    }

    /// Releases one level of the hold; the final release hands the lock to
    /// the successor, or empties the queue.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock.
    pub unsafe fn unlock(&self) {
        let node = self.node();
        let depth = node.depth.get();
        debug_assert!(depth > 0, "unlock of a queue lock that is not held");
        let depth = depth - 1;
        node.depth.set(depth);
        if ADAPTIVE {
            // The successor learns our new depth; at zero that store is the
            // handoff and there is nothing left to do.
            let next = node.next.load(Acquire);
            if !next.is_null() {
                // SAFETY: as in `broadcast`, the parked successor keeps its
                // node alive until it owns the lock.
                unsafe { &*next }.waiting.store(as_waiting(depth), Release);
                if depth == 0 {
                    return;
                }
            }
        }
        if depth > 0 {
            return;
        }
        let this = ptr::from_ref(node).cast_mut();
        let mut next = node.next.load(Acquire);
        if next.is_null() {
            if self
                .tail
                .compare_exchange(this, ptr::null_mut(), Release, Relaxed)
                .is_ok()
            {
                // No waiters: the queue is empty again.
                return;
            }
            // A successor won the tail but has not linked in yet.
            loop {
                next = node.next.load(Acquire);
                if !next.is_null() {
                    break;
                }
                hint::spin_loop();
            }
        }
        // SAFETY: the parked successor keeps its node alive until it owns
        // the lock, which happens no earlier than this store.
        unsafe { &*next }.waiting.store(UNLOCKED, Release);
    }
}

unsafe impl<R: Relax, const ADAPTIVE: bool> RawLock for RawMutex<R, ADAPTIVE> {
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

impl<R: Relax, const ADAPTIVE: bool> Default for RawMutex<R, ADAPTIVE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, const ADAPTIVE: bool> Debug for RawMutex<R, ADAPTIVE> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("queued", &!self.tail.load(Relaxed).is_null())
            .field("adaptive", &ADAPTIVE)
            .finish()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use crate::relax::{Adaptive, Yield};
    use crate::test::tests;

    type RawMutex = super::RawMutex<Yield>;
    type RawAdaptiveMutex = super::RawMutex<Adaptive, true>;

    #[test]
    fn reentrant_same_thread() {
        tests::reentrant_same_thread::<RawMutex>();
    }

    #[test]
    fn reentrant_same_thread_adaptive() {
        tests::reentrant_same_thread::<RawAdaptiveMutex>();
    }

    #[test]
    fn deep_nesting() {
        tests::deep_nesting::<RawMutex>();
    }

    #[test]
    fn deep_nesting_adaptive() {
        tests::deep_nesting::<RawAdaptiveMutex>();
    }

    #[test]
    fn exclusion_two_threads() {
        tests::exclusion_two_threads::<RawMutex>();
    }

    #[test]
    fn exclusion_two_threads_adaptive() {
        tests::exclusion_two_threads::<RawAdaptiveMutex>();
    }

    #[test]
    fn reentrant_exclusion() {
        tests::reentrant_exclusion::<RawMutex>();
    }

    #[test]
    fn reentrant_exclusion_adaptive() {
        tests::reentrant_exclusion::<RawAdaptiveMutex>();
    }

    #[test]
    fn lots_and_lots_lock() {
        tests::lots_and_lots_lock::<RawMutex>();
    }

    #[test]
    fn lots_and_lots_lock_adaptive() {
        tests::lots_and_lots_lock::<RawAdaptiveMutex>();
    }

    #[test]
    fn contention_many_threads() {
        tests::contention_many_threads::<RawMutex>();
    }

    #[test]
    fn fifo_handoff() {
        tests::fifo_handoff::<RawMutex>();
    }

    #[test]
    fn fifo_handoff_adaptive() {
        tests::fifo_handoff::<RawAdaptiveMutex>();
    }

    #[test]
    fn two_queue_locks_at_once() {
        // Nodes are per (thread, lock): holding one queue lock must not
        // leak reentrancy into another.
        let a = RawMutex::new();
        let b = RawMutex::new();
        a.lock();
        assert!(b.try_lock());
        unsafe {
            b.unlock();
            a.unlock();
        }
        assert!(a.try_lock());
        unsafe { a.unlock() };
    }
}

#[cfg(all(loom, test))]
mod model {
    use crate::loom::models;
    use crate::relax::Yield;

    type RawMutex = super::RawMutex<Yield>;
    type RawBroadcastMutex = super::RawMutex<Yield, true>;

    #[test]
    fn lock_join() {
        models::lock_join::<RawMutex>();
    }

    #[test]
    fn reentrant_lock_join() {
        models::reentrant_lock_join::<RawMutex>();
    }

    #[test]
    fn reentrant_lock_join_broadcasting() {
        models::reentrant_lock_join::<RawBroadcastMutex>();
    }
}
