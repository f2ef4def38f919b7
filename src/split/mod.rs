//! Split cache line lock implementation.
//!
//! The atomic lock word and the holder's recursion counter are mandated to
//! live on separate cache lines: waiters hammering the word do not steal
//! the line the holder bumps on every nested acquisition, and reentry never
//! performs an atomic read-modify-write at all. The word additionally
//! carries a recursion metric, a running estimate of the nesting depth of
//! past holders, published at release time and consumed by waiters as the
//! depth hint of their [`Relax`] policy.
//!
//! This mutex is generic over the relax policy. The following submodules
//! provide aliases for [`Mutex`] and [`MutexGuard`] bound to one policy
//! each; see the [`relax`] module for what the policies do.
//!
//! Acquisitions are unfair: among threads racing the word there is no
//! ordering guarantee.
//!
//! [`relax`]: crate::relax
//! [`Relax`]: crate::relax::Relax

mod raw;
pub use raw::RawMutex;

/// A [`crate::Mutex`] backed by the split cache line lock.
pub type Mutex<T, R> = crate::Mutex<T, RawMutex<R>>;

/// A [`crate::MutexGuard`] backed by the split cache line lock.
pub type MutexGuard<'a, T, R> = crate::MutexGuard<'a, T, RawMutex<R>>;

/// A split cache line lock that busy spins during contention.
pub mod spins {
    use crate::relax::Spin;

    /// A [`split::Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::split::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`split::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// A [`split::MutexGuard`] that implements the [`Spin`] relax policy.
    ///
    /// [`split::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Spin>;
}

/// A split cache line lock that yields to the scheduler during contention.
pub mod yields {
    use crate::relax::Yield;

    /// A [`split::Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::split::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`split::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// A [`split::MutexGuard`] that implements the [`Yield`] relax policy.
    ///
    /// [`split::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Yield>;
}

/// A split cache line lock that sleeps with exponential backoff during
/// contention.
pub mod backoffs {
    use crate::relax::Backoff;

    /// A [`split::Mutex`] that implements the [`Backoff`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::split::backoffs::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`split::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Backoff>;

    /// A [`split::MutexGuard`] that implements the [`Backoff`] relax policy.
    ///
    /// [`split::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Backoff>;
}

/// A split cache line lock that paces its waiters on the recursion metric.
///
/// During contention, waiters sleep in proportion to how deeply past
/// holders nested their acquisitions, and spin when history says holders
/// stay shallow.
pub mod adaptives {
    use crate::relax::Adaptive;

    /// A [`split::Mutex`] that implements the [`Adaptive`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::split::adaptives::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`split::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Adaptive>;

    /// A [`split::MutexGuard`] that implements the [`Adaptive`] relax
    /// policy.
    ///
    /// [`split::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Adaptive>;
}
