//! Same cache line lock implementation.
//!
//! Owner identity and recursion counter share one 64-bit atomic word, with
//! a non-zero counter doubling as the held flag. Reentry and release are
//! plain stores by the unique owner; only the initial acquisition pays for
//! a compare-and-swap. Compared to [`split`], the footprint is a single
//! word and there is no recursion metric: waiters see the holder's live
//! counter instead.
//!
//! This mutex is generic over the relax policy. The following submodules
//! provide aliases for [`Mutex`] and [`MutexGuard`] bound to one policy
//! each; see the [`relax`] module for what the policies do.
//!
//! Acquisitions are unfair: among threads racing the word there is no
//! ordering guarantee.
//!
//! [`split`]: crate::split
//! [`relax`]: crate::relax

mod raw;
pub use raw::RawMutex;

/// A [`crate::Mutex`] backed by the same cache line lock.
pub type Mutex<T, R> = crate::Mutex<T, RawMutex<R>>;

/// A [`crate::MutexGuard`] backed by the same cache line lock.
pub type MutexGuard<'a, T, R> = crate::MutexGuard<'a, T, RawMutex<R>>;

/// A same cache line lock that busy spins during contention.
pub mod spins {
    use crate::relax::Spin;

    /// A [`sameline::Mutex`] that implements the [`Spin`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::sameline::spins::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`sameline::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Spin>;

    /// A [`sameline::MutexGuard`] that implements the [`Spin`] relax
    /// policy.
    ///
    /// [`sameline::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Spin>;
}

/// A same cache line lock that yields to the scheduler during contention.
pub mod yields {
    use crate::relax::Yield;

    /// A [`sameline::Mutex`] that implements the [`Yield`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::sameline::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`sameline::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Yield>;

    /// A [`sameline::MutexGuard`] that implements the [`Yield`] relax
    /// policy.
    ///
    /// [`sameline::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Yield>;
}

/// A same cache line lock that sleeps with exponential backoff during
/// contention.
pub mod backoffs {
    use crate::relax::Backoff;

    /// A [`sameline::Mutex`] that implements the [`Backoff`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::sameline::backoffs::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`sameline::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Backoff>;

    /// A [`sameline::MutexGuard`] that implements the [`Backoff`] relax
    /// policy.
    ///
    /// [`sameline::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Backoff>;
}

/// A same cache line lock that paces its waiters on the holder's counter.
///
/// During contention, waiters that observe a deeply nested holder sleep in
/// proportion to its current depth, and spin otherwise.
pub mod adaptives {
    use crate::relax::Adaptive;

    /// A [`sameline::Mutex`] that implements the [`Adaptive`] relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use retlock::sameline::adaptives::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// let guard = mutex.lock();
    /// assert_eq!(*guard, 0);
    /// ```
    /// [`sameline::Mutex`]: super::Mutex
    pub type Mutex<T> = super::Mutex<T, Adaptive>;

    /// A [`sameline::MutexGuard`] that implements the [`Adaptive`] relax
    /// policy.
    ///
    /// [`sameline::MutexGuard`]: super::MutexGuard
    pub type MutexGuard<'a, T> = super::MutexGuard<'a, T, Adaptive>;
}
