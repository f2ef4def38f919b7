//! MCS-style reentrant queue lock implementation.
//!
//! The lock is a single tail pointer through which threads enqueue a
//! per-thread node; each waiter spins on a flag in its own node, on its own
//! cache line, which then avoids the network contention of every waiter
//! hammering one shared word. Releasing hands the lock to the successor by
//! a single store into that successor's node.
//!
//! The [queue discipline guarantees FIFO ordering] among distinct threads:
//! locks are granted in the order the enqueue on the tail succeeded.
//! Reentry by the holder is thread-local bookkeeping and does not requeue,
//! so a nested holder keeps its place implicitly.
//!
//! Nodes are managed internally, one per (thread, lock) pair, created on a
//! thread's first contact with a lock and reused afterwards. A thread may
//! therefore hold several queue locks simultaneously.
//!
//! This mutex is generic over the relax policy driven while parked. The
//! [`adaptives`] variant additionally has the holder broadcast its
//! recursion depth to its successor, which sleeps out deeply nested
//! holders; see the [`relax`] module.
//!
//! [queue discipline guarantees FIFO ordering]: https://dl.acm.org/doi/10.1145/103727.103729
//! [`relax`]: crate::relax

mod node;
mod raw;
pub use raw::RawMutex;

/// A [`crate::Mutex`] backed by the queue lock.
pub type Mutex<T, R> = crate::Mutex<T, RawMutex<R>>;

/// A [`crate::MutexGuard`] backed by the queue lock.
pub type MutexGuard<'a, T, R> = crate::MutexGuard<'a, T, RawMutex<R>>;

/// A queue lock whose waiters busy spin on their nodes.
pub mod spins {
    use crate::relax::Spin;

    /// A [`queue::Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::queue::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`queue::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// A [`queue::MutexGuard`] that implements the [`Spin`] relax policy.
    ///
    /// [`queue::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Spin>;
}

/// A queue lock whose waiters yield to the scheduler while parked.
pub mod yields {
    use crate::relax::Yield;

    /// A [`queue::Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::queue::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`queue::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// A [`queue::MutexGuard`] that implements the [`Yield`] relax policy.
    ///
    /// [`queue::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Yield>;
}

/// A queue lock whose holder broadcasts its recursion depth.
///
/// The holder stores its depth into the successor's wait flag on every
/// nested acquisition and release, and the [`Adaptive`] policy on the
/// waiting side sleeps in proportion while the holder stays deep.
///
/// [`Adaptive`]: crate::relax::Adaptive
pub mod adaptives {
    use crate::relax::Adaptive;

    /// A [`queue::Mutex`] that broadcasts depth to [`Adaptive`] waiters.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::queue::adaptives::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`queue::Mutex`]: super::Mutex
    pub type Mutex<T> = crate::Mutex<T, super::RawMutex<Adaptive, true>>;

    /// A [`queue::MutexGuard`] for the depth broadcasting queue lock.
    ///
    /// [`queue::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = crate::MutexGuard<'a, T, super::RawMutex<Adaptive, true>>;
}
